//! Config loading: assembles sources in precedence order and deserializes.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::LexisConfig;
use config::{ConfigError, Environment, File};
use std::path::Path;

const ENV_PREFIX: &str = "LEXIS";
const ENV_SEPARATOR: &str = "__";

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("speech.voices")
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest first): defaults, global file, `config/config.toml`,
    /// `config/{LEXIS_ENV}.toml`, `LEXIS__SECTION__KEY` environment variables.
    pub fn load(workspace_root: &Path) -> Result<LexisConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder.add_source(environment()).build()?.try_deserialize()
    }

    /// Load configuration from one explicit file (no discovery), plus environment.
    pub fn load_from_file(path: &Path) -> Result<LexisConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }
}
