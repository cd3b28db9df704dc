//! Record schemas for the text stages.
//!
//! A schema knows how to ask for a work item (the generation request) and how
//! to repair what came back (required-field defaults).

use crate::catalog::WorkItem;
use crate::error::ProviderError;
use crate::normalize::{fill_complexity, fill_text, Normalized, Record};
use crate::provider::{GenerationRequest, SafetySetting, SamplingOptions};
use crate::stats::StatisticsProfile;
use serde_json::Value;

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

const JSON_MIME_TYPE: &str = "application/json";

fn safety_settings() -> Vec<SafetySetting> {
    HARM_CATEGORIES.iter().map(|c| SafetySetting::off(c)).collect()
}

pub trait RecordSchema: Send + Sync {
    /// Stage name used in logs and reports
    fn name(&self) -> &'static str;

    fn profile(&self) -> StatisticsProfile;

    fn build_request(&self, item: &WorkItem) -> GenerationRequest;

    /// Reject payloads that decode but cannot yield any record.
    fn check(&self, item: &WorkItem, payload: &Record) -> Result<(), ProviderError> {
        let _ = (item, payload);
        Ok(())
    }

    /// Repair required fields. Never fails.
    fn normalize(&self, item: &WorkItem, payload: Record) -> Normalized;
}

/// Letter -> 100 words with complexity, definition and example.
#[derive(Debug, Clone)]
pub struct WordListSchema {
    pub words_per_letter: usize,
}

impl Default for WordListSchema {
    fn default() -> Self {
        Self {
            words_per_letter: 100,
        }
    }
}

impl RecordSchema for WordListSchema {
    fn name(&self) -> &'static str {
        "words"
    }

    fn profile(&self) -> StatisticsProfile {
        StatisticsProfile::Basic
    }

    fn build_request(&self, item: &WorkItem) -> GenerationRequest {
        let prompt = format!(
            r#"Please provide a list of {count} intermediate to Advanced English words starting with
the letter '{letter}', suitable for SAT and GRE preparation. For each word,
provide its definition and an example sentence.
The output MUST be a valid JSON object where each key is the word and the value
is an object with simplified structure.

IMPORTANT: For the "complexity" field, choose either "Intermediate" or "Advanced":
- "Intermediate": Words that are moderately difficult, suitable for high school to early college level
- "Advanced": Words that are very difficult, suitable for college level and above (SAT/GRE level)

Do not include any text or formatting before or after the JSON object.

Example for the letter 'A':
{{
  "Abnegation": {{
    "complexity": "Intermediate",
    "definition": "The act of renouncing or rejecting something desired or valuable.",
    "example": "Her abnegation of rich food was an act of solidarity with the poor."
  }},
  "Acquiesce": {{
    "complexity": "Advanced",
    "definition": "To accept something reluctantly but without protest.",
    "example": "While I did not want to go to the party, I had to acquiesce because my friend insisted."
  }}
}}"#,
            count = self.words_per_letter,
            letter = item.letter.to_uppercase(),
        );

        GenerationRequest {
            prompt,
            options: SamplingOptions {
                temperature: Some(0.5),
                top_p: Some(0.95),
                seed: Some(0),
                max_output_tokens: Some(65535),
                thinking_budget: Some(-1),
            },
            response_mime_type: Some(JSON_MIME_TYPE.to_string()),
            safety_settings: safety_settings(),
        }
    }

    fn check(&self, item: &WorkItem, payload: &Record) -> Result<(), ProviderError> {
        if payload.is_empty() {
            return Err(ProviderError::MalformedResponse(format!(
                "no words returned for letter {}",
                item.letter
            )));
        }
        Ok(())
    }

    fn normalize(&self, _item: &WorkItem, payload: Record) -> Normalized {
        let mut normalized = Normalized::default();
        for (word, value) in payload {
            let mut record = match value {
                Value::Object(record) => record,
                _ => Record::new(),
            };
            normalized
                .substitutions
                .extend(fill_complexity(&word, &mut record));
            normalized.entries.push((word, record));
        }
        normalized
    }
}

/// Word -> full dictionary entry.
#[derive(Debug, Clone, Default)]
pub struct DetailSchema;

impl RecordSchema for DetailSchema {
    fn name(&self) -> &'static str {
        "details"
    }

    fn profile(&self) -> StatisticsProfile {
        StatisticsProfile::Detailed
    }

    fn build_request(&self, item: &WorkItem) -> GenerationRequest {
        let prompt = format!(
            r#"Please provide detailed information for the English word '{word}' starting with letter '{letter}'.
The output MUST be a valid JSON object with the following structure:

{{
  "complexity": "Intermediate" or "Advanced",
  "pronunciation": {{
    "General_American_GA_pronunciation_us": "/pronunciation/",
    "The_International_Phonetic_Alphabet_ipa_uk": "/pronunciation/"
  }},
  "phonetic_respelling": "uh-bate",
  "ssml_phoneme": "ph=\"əˈbeɪt\"",
  "meanings": [
    {{
      "part_of_speech": "Noun/Verb/Adjective/Adverb",
      "definitions": [
        {{
          "definition": "Clear definition of the word",
          "example": "Example sentence using the word",
          "synonyms": ["synonym1", "synonym2", "synonym3"],
          "antonyms": ["antonym1", "antonym2", "antonym3"]
        }}
      ],
      "verb_forms": {{
        "infinitive": "to word",
        "present_participle": "wording",
        "past_participle": "worded"
      }}
    }}
  ],
  "word_origin": "Etymology and origin of the word",
  "word_roots": [
    {{
      "root": "root_word",
      "meaning": "meaning of the root"
    }}
  ]
}}

IMPORTANT: For the "complexity" field, choose either "Intermediate" or "Advanced" based on the word's difficulty level:
- "Intermediate": Words that are moderately difficult, suitable for high school to early college level
- "Advanced": Words that are very difficult, suitable for college level and above (SAT/GRE level)

IMPORTANT: For pronunciation fields:
- "phonetic_respelling": Provide a simple phonetic respelling using common English sounds (e.g., "uh-bate" for "abate")
- "ssml_phoneme": Provide the SSML phoneme tag with IPA pronunciation (e.g., ph=\"əˈbeɪt\" for "abate")

If the word is not a verb, omit the "verb_forms" section.
Provide accurate pronunciation, etymology, and comprehensive definitions.
Do not include any text before or after the JSON object."#,
            word = item.key,
            letter = item.letter.to_uppercase(),
        );

        GenerationRequest {
            prompt,
            options: SamplingOptions {
                temperature: Some(0.3),
                top_p: Some(0.9),
                seed: Some(0),
                max_output_tokens: Some(8192),
                thinking_budget: Some(-1),
            },
            response_mime_type: Some(JSON_MIME_TYPE.to_string()),
            safety_settings: safety_settings(),
        }
    }

    fn normalize(&self, item: &WorkItem, mut payload: Record) -> Normalized {
        let mut substitutions = Vec::new();
        substitutions.extend(fill_complexity(&item.key, &mut payload));
        substitutions.extend(fill_text(&item.key, &mut payload, "phonetic_respelling"));
        substitutions.extend(fill_text(&item.key, &mut payload, "ssml_phoneme"));
        Normalized {
            entries: vec![(item.key.clone(), payload)],
            substitutions,
        }
    }
}
