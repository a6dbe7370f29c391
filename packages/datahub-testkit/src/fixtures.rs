//! Shared configuration, principals and documents for search tests.

use serde_json::{Value, json};

use datahub_config::Config;
use datahub_search::Principal;

use crate::{MemoryIndex, Result};

pub const READ_COMPANY: &str = "company.read_company";
pub const READ_INTERACTION: &str = "interaction.read_interaction";
pub const READ_PROJECT: &str = "investment.read_associated_investmentproject";
pub const VIEW_ALL_PROJECTS: &str = "investment.view_all_investmentproject";

const TEST_CONFIG: &str = r#"
[service]
http_bind = "127.0.0.1:0"
log_level = "debug"

[elasticsearch]
url   = "http://127.0.0.1:9200"
index = "datahub-test"

[search]
default_limit    = 100
default_entity   = "company"
ignored_entities = []

[[entities]]
name            = "company"
doc_type        = "company"
search_fields   = ["name", "trading_names"]
sort_fields     = ["name", "created_on"]
filter_fields   = ["name", "sector", "created_on_after", "created_on_before"]
read_permission = "company.read_company"

[entities.remap_fields]
sector = "sector.id"

[[entities]]
name               = "interaction"
doc_type           = "interaction"
search_fields      = ["subject", "company.name", "contact.name", "dit_team.name", "notes"]
sort_fields        = [
	"company.name",
	"contact.name",
	"date",
	"dit_adviser.name",
	"dit_team.name",
	"id",
	"subject",
]
filter_fields      = ["company", "contact_name", "date_after", "date_before", "dit_team", "kind"]
aggregation_fields = ["kind", "dit_team.id"]
default_sort       = "date:desc"
read_permission    = "interaction.read_interaction"

[entities.remap_fields]
company  = "company.id"
dit_team = "dit_team.id"

[entities.composite_filters]
contact_name = ["contact.name", "contact.name_trigram"]

[[entities]]
name            = "investment_project"
doc_type        = "investment_project"
search_fields   = ["name", "project_code"]
sort_fields     = ["name", "created_on"]
filter_fields   = ["stage", "created_on_after", "created_on_before"]
read_permission = "investment.read_associated_investmentproject"

[entities.remap_fields]
stage = "stage.id"

[entities.permissions]
view_all    = "investment.view_all_investmentproject"
team_fields = ["created_by.dit_team.id", "team_members.dit_team.id"]
"#;

/// Configuration with company, interaction and investment project entities.
pub fn test_config() -> Result<Config> {
	let cfg: Config = toml::from_str(TEST_CONFIG)?;

	datahub_config::validate(&cfg)?;

	Ok(cfg)
}

/// May read every entity and every investment project.
pub fn full_access() -> Principal {
	Principal::new([READ_COMPANY, READ_INTERACTION, READ_PROJECT, VIEW_ALL_PROJECTS])
}

/// May read every entity, but only the investment projects of `team_id`.
pub fn team_member(team_id: &str) -> Principal {
	Principal::new([READ_COMPANY, READ_INTERACTION, READ_PROJECT]).with_team(team_id)
}

pub fn companies() -> Vec<Value> {
	vec![
		json!({
			"id": "c-acme",
			"name": "Acme Trading",
			"name_keyword": "Acme Trading",
			"trading_names": ["Acme"],
			"sector": { "id": "s-aero", "name": "Aerospace" },
			"created_on": "2016-05-01T09:00:00Z",
		}),
		json!({
			"id": "c-widget",
			"name": "Widget Works",
			"name_keyword": "Widget Works",
			"trading_names": [],
			"sector": { "id": "s-food", "name": "Food and drink" },
			"created_on": "2017-08-14T09:00:00Z",
		}),
	]
}

/// Five interactions with distinct subjects and dates spread over 2016 to 2018.
pub fn interactions() -> Vec<Value> {
	vec![
		interaction(["i-1", "Exports meeting", "2017-10-30", "c-acme", "Jo Bloggs", "team-a"]),
		interaction(["i-2", "a coffee", "2017-04-05", "c-widget", "Sam Smith", "team-b"]),
		interaction(["i-3", "Email about exhibition", "2016-09-02", "c-acme", "Sam Smith", "team-a"]),
		interaction(["i-4", "talking about cats", "2018-02-01", "c-widget", "Jo Bloggs", "team-b"]),
		interaction(["i-5", "Event at HQ", "2018-01-01", "c-acme", "Joanna Doe", "team-a"]),
	]
}

pub fn investment_projects() -> Vec<Value> {
	vec![
		json!({
			"id": "p-1",
			"name": "Wind farm",
			"project_code": "DHP-00000001",
			"stage": { "id": "stage-prospect" },
			"created_by": { "dit_team": { "id": "team-a" } },
			"team_members": [],
			"created_on": "2017-01-01T00:00:00Z",
		}),
		json!({
			"id": "p-2",
			"name": "Solar park",
			"project_code": "DHP-00000002",
			"stage": { "id": "stage-active" },
			"created_by": { "dit_team": { "id": "team-c" } },
			"team_members": [{ "dit_team": { "id": "team-b" } }],
			"created_on": "2017-06-01T00:00:00Z",
		}),
		json!({
			"id": "p-3",
			"name": "Wind turbines",
			"project_code": "DHP-00000003",
			"stage": { "id": "stage-active" },
			"created_by": { "dit_team": { "id": "team-c" } },
			"team_members": [],
			"created_on": "2018-03-01T00:00:00Z",
		}),
	]
}

/// Index holding every fixture document.
pub fn seeded_index() -> Result<MemoryIndex> {
	let mut index = MemoryIndex::new();

	for source in companies() {
		index.insert("company", source)?;
	}
	for source in interactions() {
		index.insert("interaction", source)?;
	}
	for source in investment_projects() {
		index.insert("investment_project", source)?;
	}

	Ok(index)
}

fn interaction([id, subject, date, company_id, contact_name, team_id]: [&str; 6]) -> Value {
	let company_name = companies()
		.into_iter()
		.find(|company| company["id"] == company_id)
		.and_then(|company| company["name"].as_str().map(str::to_string))
		.unwrap_or_default();

	json!({
		"id": id,
		"subject": subject,
		"date": format!("{date}T00:00:00Z"),
		"kind": "interaction",
		"company": { "id": company_id, "name": company_name },
		"contact": {
			"id": format!("contact-{contact_name}"),
			"name": contact_name,
			"name_trigram": edge_grams(contact_name),
		},
		"dit_team": { "id": team_id, "name": format!("Team {team_id}") },
		"notes": format!("Notes for {subject}."),
	})
}

/// Prefixes of each word from two characters up, as the trigram sub-field indexes them.
fn edge_grams(text: &str) -> String {
	text.split_whitespace()
		.flat_map(|word| {
			let word = word.to_lowercase();
			let ends: Vec<usize> = word.char_indices().map(|(at, c)| at + c.len_utf8()).collect();

			ends.into_iter().skip(1).map(move |end| word[..end].to_string())
		})
		.collect::<Vec<_>>()
		.join(" ")
}
