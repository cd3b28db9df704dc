//! Merge rules: built-in defaults, lowest precedence.

use crate::audio::DEFAULT_VOICES;
use crate::config::StageTuning;
use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

fn set_stage(
    builder: ConfigBuilder<DefaultState>,
    stage: &str,
    tuning: StageTuning,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let key = |field: &str| format!("pipeline.{}.{}", stage, field);
    builder
        .set_default(key("max_retries"), tuning.max_retries as u64)?
        .set_default(key("base_delay_ms"), tuning.base_delay_ms)?
        .set_default(key("jitter_ms"), tuning.jitter_ms)?
        .set_default(key("item_delay_ms"), tuning.item_delay_ms)
}

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let voices: Vec<String> = DEFAULT_VOICES.iter().map(|v| v.to_string()).collect();
    let builder = Config::builder()
        .set_default("speech.voices", voices)?
        .set_default("storage.word_list", "data/word_list.json")?
        .set_default("storage.dictionary", "data/dictionary.json")?
        .set_default("storage.audio_dir", "audio")?;
    let builder = set_stage(builder, "words", StageTuning::WORDS)?;
    let builder = set_stage(builder, "details", StageTuning::DETAILS)?;
    set_stage(builder, "audio", StageTuning::AUDIO)
}
