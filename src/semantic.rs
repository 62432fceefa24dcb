//! Semantic fallback for commands the rule-based parser classifies poorly.
//!
//! The assistant asks an [`IntentReclassifier`] for a second opinion after parsing.
//! [`NoopReclassifier`] never answers, so executors see the parser's slots as-is.
//! With the `semantic` feature, [`SemanticMatcher`] compares the raw command against a
//! catalog of example phrasings by cosine similarity of their embeddings.

use crate::parse::{CommandSlots, Intent};

/// Intent (and possibly object) override proposed by a reclassifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Reclassification {
    pub intent: Intent,
    pub object: Option<String>,
    pub score: f32,
    /// Catalog phrasing that produced the match.
    pub matched: String,
}

impl Reclassification {
    /// Overwrites the intent, and the object when one was proposed.
    pub fn apply(&self, slots: &mut CommandSlots) {
        slots.intent = self.intent;
        if let Some(object) = &self.object {
            slots.object = Some(object.clone());
        }
    }
}

pub trait IntentReclassifier: Send + Sync {
    /// Returns `None` to keep the parser's result.
    fn reclassify(&self, text: &str, slots: &CommandSlots) -> Option<Reclassification>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReclassifier;

impl IntentReclassifier for NoopReclassifier {
    fn reclassify(&self, _text: &str, _slots: &CommandSlots) -> Option<Reclassification> {
        None
    }
}

#[cfg(feature = "semantic")]
pub use matcher::{Embedder, HashingEmbedder, SemanticMatcher, DEFAULT_ACCEPTANCE};

#[cfg(feature = "semantic")]
mod matcher {
    use sha2::{Digest, Sha256};

    use super::{IntentReclassifier, Reclassification};
    use crate::parse::{CommandSlots, Intent};

    pub const DEFAULT_ACCEPTANCE: f32 = 0.6;
    const EMBEDDING_DIM: usize = 512;
    const TRIGRAM_WEIGHT: f32 = 0.5;

    const CATALOG: &[(Intent, &[&str])] = &[
        (
            Intent::QueryCount,
            &[
                "how many people",
                "how many people are there",
                "count the people",
                "number of people",
                "how many humans",
                "how many persons",
                "tell me how many",
                "count people",
                "how many do you see",
                "people count",
                "how many chairs",
                "count chairs",
                "how many objects",
            ],
        ),
        (
            Intent::QueryPresence,
            &[
                "is there a person",
                "is there anyone",
                "do you see a person",
                "can you see anyone",
                "is anyone there",
                "are there people",
                "person present",
                "anyone here",
                "is there a chair",
                "do you see a chair",
            ],
        ),
        (
            Intent::QueryLocation,
            &[
                "where is the person",
                "where is the chair",
                "location of person",
                "find the person",
                "person location",
                "where's the person",
                "show me where",
                "position of person",
                "where can i find",
                "which side is the person",
            ],
        ),
        (
            Intent::DescribeScene,
            &[
                "describe the scene",
                "what do you see",
                "tell me what's there",
                "what's in front of me",
                "describe what you see",
                "what's around me",
                "scene description",
                "tell me about the scene",
                "what objects are there",
                "give me details",
            ],
        ),
    ];

    const DESCRIBE_CUES: &[&str] = &["describe", "what do you see", "what's in front", "scene"];
    const SEEING_CUES: &[&str] = &[
        "what do you see",
        "what are you seeing",
        "tell me what",
        "what's there",
    ];
    const PEOPLE_WORDS: &[&str] = &[
        "people", "person", "human", "humans", "man", "woman", "men", "women",
    ];

    /// Maps text to a fixed-length vector. Vectors are compared by dot product, so
    /// implementations should return unit-length vectors.
    pub trait Embedder: Send + Sync {
        fn embed(&self, text: &str) -> Vec<f32>;
    }

    /// Deterministic embedder: signed feature hashing of words and character
    /// trigrams into a fixed number of buckets, L2-normalized.
    #[derive(Clone, Copy, Debug)]
    pub struct HashingEmbedder {
        dim: usize,
    }

    impl HashingEmbedder {
        pub fn new(dim: usize) -> Self {
            Self { dim: dim.max(1) }
        }

        fn bucket(&self, feature: &str) -> (usize, f32) {
            let digest = Sha256::digest(feature.as_bytes());
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&digest[..8]);
            let h = u64::from_le_bytes(raw);
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            ((h % self.dim as u64) as usize, sign)
        }
    }

    impl Default for HashingEmbedder {
        fn default() -> Self {
            Self::new(EMBEDDING_DIM)
        }
    }

    impl Embedder for HashingEmbedder {
        fn embed(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; self.dim];
            let lowered = text.to_lowercase();
            let words = lowered
                .split(|c: char| !(c.is_alphanumeric() || c == '\''))
                .filter(|w| !w.is_empty());
            for word in words {
                let (i, sign) = self.bucket(&format!("w:{word}"));
                v[i] += sign;
                let padded: Vec<char> = format!("#{word}#").chars().collect();
                for gram in padded.windows(3) {
                    let gram: String = gram.iter().collect();
                    let (i, sign) = self.bucket(&format!("t:{gram}"));
                    v[i] += sign * TRIGRAM_WEIGHT;
                }
            }
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                v.iter_mut().for_each(|x| *x /= norm);
            }
            v
        }
    }

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    struct CatalogEntry {
        intent: Intent,
        phrase: &'static str,
        embedding: Vec<f32>,
    }

    /// Nearest-example intent matcher over the built-in phrasing catalog.
    pub struct SemanticMatcher {
        embedder: Box<dyn Embedder>,
        entries: Vec<CatalogEntry>,
        acceptance: f32,
    }

    impl SemanticMatcher {
        pub fn new(embedder: Box<dyn Embedder>, acceptance: f32) -> Self {
            let entries: Vec<CatalogEntry> = CATALOG
                .iter()
                .flat_map(|(intent, phrases)| {
                    phrases.iter().map(move |phrase| (*intent, *phrase))
                })
                .map(|(intent, phrase)| CatalogEntry {
                    intent,
                    phrase,
                    embedding: embedder.embed(phrase),
                })
                .collect();
            log::info!("semantic matcher ready with {} phrasings", entries.len());
            Self {
                embedder,
                entries,
                acceptance: acceptance.clamp(0.0, 1.0),
            }
        }

        pub fn acceptance(&self) -> f32 {
            self.acceptance
        }

        /// Best catalog entry for `text` as `(intent, score, phrase)`, regardless of
        /// the acceptance score.
        pub fn nearest(&self, text: &str) -> Option<(Intent, f32, &'static str)> {
            let query = self.embedder.embed(text);
            self.entries
                .iter()
                .map(|e| (e.intent, dot(&e.embedding, &query), e.phrase))
                .fold(None, |best, cand| match best {
                    Some((_, score, _)) if score >= cand.1 => best,
                    _ => Some(cand),
                })
        }

        /// Whether the parser's result is doubtful enough to consult the catalog.
        fn should_consult(text: &str, slots: &CommandSlots) -> bool {
            let t = text.to_lowercase();
            match slots.intent {
                Intent::DescribeScene => !DESCRIBE_CUES.iter().any(|cue| t.contains(cue)),
                Intent::QueryPresence => SEEING_CUES.iter().any(|cue| t.contains(cue)),
                Intent::QueryCount => slots.object.is_none(),
                _ => false,
            }
        }
    }

    impl Default for SemanticMatcher {
        fn default() -> Self {
            Self::new(Box::new(HashingEmbedder::default()), DEFAULT_ACCEPTANCE)
        }
    }

    impl IntentReclassifier for SemanticMatcher {
        fn reclassify(&self, text: &str, slots: &CommandSlots) -> Option<Reclassification> {
            if !Self::should_consult(text, slots) {
                return None;
            }
            let (intent, score, matched) = self.nearest(text)?;
            if score < self.acceptance {
                log::debug!("semantic: {text:?} best {matched:?} at {score:.2}, rejected");
                return None;
            }
            log::debug!("semantic: {text:?} -> {intent} (score {score:.2}, matched {matched:?})");
            let lowered = text.to_lowercase();
            let mentions_people = lowered
                .split(|c: char| !c.is_alphanumeric())
                .any(|w| PEOPLE_WORDS.contains(&w));
            let object = (intent == Intent::QueryCount && mentions_people)
                .then(|| "person".to_string());
            Some(Reclassification {
                intent,
                object,
                score,
                matched: matched.to_string(),
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::parse::CommandParser;

        fn reclassify(text: &str) -> Option<Reclassification> {
            let slots = CommandParser::default().parse(text);
            SemanticMatcher::default().reclassify(text, &slots)
        }

        #[test]
        fn embeddings_are_unit_length_and_deterministic() {
            let e = HashingEmbedder::default();
            let a = e.embed("how many people");
            let b = e.embed("How many people");
            assert_eq!(a, b);
            assert!((dot(&a, &a) - 1.0).abs() < 1e-4);
            assert!(e.embed("").iter().all(|x| *x == 0.0));
        }

        #[test]
        fn unknown_count_object_becomes_person() {
            let r = reclassify("how many humans").expect("count without object consults");
            assert_eq!(r.intent, Intent::QueryCount);
            assert_eq!(r.object.as_deref(), Some("person"));
            assert_eq!(r.matched, "how many humans");
        }

        #[test]
        fn catch_all_describe_is_reconsidered() {
            let r = reclassify("is anyone there").expect("describe without cue consults");
            assert_eq!(r.intent, Intent::QueryPresence);
            assert_eq!(r.object, None);
        }

        #[test]
        fn seeing_question_becomes_describe() {
            let slots = CommandParser::default().parse("what do you see");
            assert_eq!(slots.intent, Intent::QueryPresence);
            let r = SemanticMatcher::default()
                .reclassify("what do you see", &slots)
                .expect("presence phrased as seeing question consults");
            assert_eq!(r.intent, Intent::DescribeScene);
        }

        #[test]
        fn confident_parses_are_left_alone() {
            assert!(reclassify("describe the scene").is_none());
            assert!(reclassify("how many dogs").is_none());
            assert!(reclassify("where is the dog").is_none());
        }

        #[test]
        fn unrelated_text_is_rejected() {
            assert!(reclassify("qwerty zxcv").is_none());
        }
    }
}
