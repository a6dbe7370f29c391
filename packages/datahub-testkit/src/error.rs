pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Message(String),

	#[error("Unsupported by the in-memory index: {0}.")]
	Unsupported(String),

	#[error(transparent)]
	Config(#[from] datahub_config::Error),

	#[error(transparent)]
	Toml(#[from] toml::de::Error),
}
