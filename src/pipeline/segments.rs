//! Segment resolver.
//!
//! Effect markers split a message into segments; each segment is rendered
//! as one unit with the effects that preceded it. `{n}` markers accumulate
//! until a `{.}` reset clears them, so a later segment keeps every effect
//! announced before it.

use std::path::PathBuf;

use tracing::debug;

use super::tokenizer::Token;
use crate::library::SampleLibrary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Library clip, played as recorded.
    Sample { name: String, path: PathBuf },
    /// Text for the synthesizer, not yet normalized.
    Speech(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub sources: Vec<Source>,
    /// Effect ids in marker order, repeats included.
    pub effect_ids: Vec<u32>,
}

impl Segment {
    #[cfg(test)]
    pub fn sample_count(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s, Source::Sample { .. }))
            .count()
    }
}

struct Resolver<'a> {
    library: &'a SampleLibrary,
    sound_cap: usize,
    samples_used: &'a mut usize,
    segments: Vec<Segment>,
    current: Vec<Source>,
    pending: Vec<u32>,
}

impl Resolver<'_> {
    fn close(&mut self) {
        if self.current.is_empty() {
            return;
        }
        self.segments.push(Segment {
            sources: std::mem::take(&mut self.current),
            effect_ids: self.pending.clone(),
        });
    }

    fn sample_or_speech(&mut self, name: &str) -> Option<Source> {
        if *self.samples_used < self.sound_cap {
            if let Some(path) = self.library.path_of(name) {
                *self.samples_used += 1;
                return Some(Source::Sample {
                    name: name.to_string(),
                    path: path.to_path_buf(),
                });
            }
        }

        debug!("{name} is not playable as a sample, speaking it instead");
        let inner = name
            .strip_prefix('[')
            .and_then(|n| n.strip_suffix(']'))
            .unwrap_or(name)
            .trim();
        (!inner.is_empty()).then(|| Source::Speech(inner.to_string()))
    }
}

/// Group tokens into segments. `samples_used` is the message's sample
/// counter; references are played from the library while it is below `sound_cap`.
pub fn resolve(
    tokens: &[Token],
    library: &SampleLibrary,
    sound_cap: usize,
    samples_used: &mut usize,
) -> Vec<Segment> {
    let mut resolver = Resolver {
        library,
        sound_cap,
        samples_used,
        segments: Vec::new(),
        current: Vec::new(),
        pending: Vec::new(),
    };

    for token in tokens {
        match token {
            Token::EffectMarker(id) => {
                resolver.close();
                resolver.pending.push(*id);
            }
            Token::ResetMarker => {
                resolver.close();
                resolver.pending.clear();
            }
            Token::Text(text) => resolver.current.push(Source::Speech(text.clone())),
            Token::SampleRef(name) => {
                if let Some(source) = resolver.sample_or_speech(name) {
                    resolver.current.push(source);
                }
            }
        }
    }
    resolver.close();

    resolver.segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tokenizer::tokenize;

    fn library() -> SampleLibrary {
        SampleLibrary::from_entries([
            ("[boo]".to_string(), PathBuf::from("sounds/boo.wav")),
            ("[horn]".to_string(), PathBuf::from("sounds/horn.wav")),
        ])
    }

    fn resolve_fresh(text: &str, sound_cap: usize) -> Vec<Segment> {
        resolve(&tokenize(text), &library(), sound_cap, &mut 0)
    }

    fn speech(s: &str) -> Source {
        Source::Speech(s.to_string())
    }

    fn boo() -> Source {
        Source::Sample {
            name: "[boo]".into(),
            path: PathBuf::from("sounds/boo.wav"),
        }
    }

    #[test]
    fn splits_on_markers_and_reset() {
        let segments = resolve_fresh("hello [boo] {1}world{.} end", 3);
        assert_eq!(
            segments,
            vec![
                Segment {
                    sources: vec![speech("hello"), boo()],
                    effect_ids: vec![],
                },
                Segment {
                    sources: vec![speech("world")],
                    effect_ids: vec![1],
                },
                Segment {
                    sources: vec![speech("end")],
                    effect_ids: vec![],
                },
            ]
        );
    }

    #[test]
    fn effects_accumulate_until_reset() {
        let segments = resolve_fresh("{1}a{2}b{2}{.}{5}c", 3);
        let ids: Vec<_> = segments.iter().map(|s| s.effect_ids.clone()).collect();
        assert_eq!(ids, vec![vec![1], vec![1, 2], vec![5]]);
    }

    #[test]
    fn trailing_markers_without_text_produce_nothing() {
        assert!(resolve_fresh("{1}{2}{.}", 3).is_empty());
        assert!(resolve(&[], &library(), 3, &mut 0).is_empty());
    }

    #[test]
    fn unknown_sample_is_spoken_without_brackets() {
        let segments = resolve_fresh("[nope] []", 3);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].sources, vec![speech("nope")]);
    }

    #[test]
    fn samples_past_the_cap_are_spoken() {
        let segments = resolve_fresh("[boo] [horn] {3}[boo]", 2);
        assert_eq!(segments[0].sample_count(), 2);
        assert_eq!(segments[1].sources, vec![speech("boo")]);
    }

    #[test]
    fn counter_carries_across_calls() {
        let mut used = 0;
        let first = resolve(&tokenize("[boo] [horn]"), &library(), 3, &mut used);
        assert_eq!(first[0].sample_count(), 2);
        assert_eq!(used, 2);

        let second = resolve(&tokenize("[horn] [boo]"), &library(), 3, &mut used);
        let horn = Source::Sample {
            name: "[horn]".into(),
            path: PathBuf::from("sounds/horn.wav"),
        };
        assert_eq!(second[0].sources, vec![horn, speech("boo")]);
        assert_eq!(used, 3);
    }

    #[test]
    fn zero_cap_disables_samples() {
        let segments = resolve_fresh("[boo]", 0);
        assert_eq!(segments[0].sources, vec![speech("boo")]);
    }
}
