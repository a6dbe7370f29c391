use std::{collections::BTreeMap, fmt};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Key under which errors that concern the request as a whole are reported.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Validation failed: {0}")]
	Validation(ValidationErrors),
	#[error("Unknown entity {name:?}.")]
	UnknownEntity { name: String },
	#[error("Permission denied: {message}")]
	PermissionDenied { message: String },
	#[error("Search backend error: {message}")]
	Backend { message: String },
	#[error("Malformed search response: {message}")]
	MalformedResponse { message: String },
}
impl From<ValidationErrors> for Error {
	fn from(errors: ValidationErrors) -> Self {
		Self::Validation(errors)
	}
}

impl From<datahub_elasticsearch::Error> for Error {
	fn from(err: datahub_elasticsearch::Error) -> Self {
		Self::Backend { message: err.to_string() }
	}
}

/// Field name to the messages raised against it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);
impl ValidationErrors {
	pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
		self.0.entry(field.into()).or_default().push(message.into());
	}

	pub fn non_field(&mut self, message: impl Into<String>) {
		self.add(NON_FIELD_ERRORS, message);
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn get(&self, field: &str) -> Option<&[String]> {
		self.0.get(field).map(Vec::as_slice)
	}

	pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
		&self.0
	}

	/// `Ok(())` when nothing was recorded.
	pub fn into_result(self) -> Result<()> {
		if self.is_empty() { Ok(()) } else { Err(Error::Validation(self)) }
	}
}
impl fmt::Display for ValidationErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut first = true;

		for (field, messages) in &self.0 {
			for message in messages {
				if !first {
					f.write_str("; ")?;
				}

				write!(f, "{field}: {message}")?;

				first = false;
			}
		}

		Ok(())
	}
}
