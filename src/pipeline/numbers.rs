//! Digit runs to spoken words.
//!
//! The synthesizer reads raw digits poorly (or letter by letter), so every
//! run of numeric characters is spelled out in the configured language
//! before a text is sent off. Runs that cannot be spelled stay as they are.

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "pl")]
    Polish,
    #[serde(rename = "en")]
    English,
}

pub struct NumberNormalizer {
    language: Language,
}

impl NumberNormalizer {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    /// Replace each digit run in `text` with its word form.
    pub fn normalize(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut digits = String::new();

        for ch in text.chars() {
            if ch.is_numeric() {
                digits.push(ch);
                continue;
            }
            if !digits.is_empty() {
                self.flush(&mut digits, &mut out);
            }
            out.push(ch);
        }
        if !digits.is_empty() {
            self.flush(&mut digits, &mut out);
        }

        out
    }

    fn flush(&self, digits: &mut String, out: &mut String) {
        match digits.parse::<u64>() {
            Ok(n) => out.push_str(&self.spell(n)),
            Err(e) => {
                warn!("Could not convert number '{digits}': {e}");
                out.push_str(digits);
            }
        }
        digits.clear();
    }

    pub fn spell(&self, n: u64) -> String {
        match self.language {
            Language::Polish => polish::spell(n),
            Language::English => english::spell(n),
        }
    }
}

/// Split into three-digit groups, lowest first.
fn groups(mut n: u64) -> Vec<u16> {
    let mut groups = Vec::new();
    while n > 0 {
        groups.push((n % 1000) as u16);
        n /= 1000;
    }
    groups
}

mod polish {
    const ONES: [&str; 20] = [
        "zero",
        "jeden",
        "dwa",
        "trzy",
        "cztery",
        "pięć",
        "sześć",
        "siedem",
        "osiem",
        "dziewięć",
        "dziesięć",
        "jedenaście",
        "dwanaście",
        "trzynaście",
        "czternaście",
        "piętnaście",
        "szesnaście",
        "siedemnaście",
        "osiemnaście",
        "dziewiętnaście",
    ];
    const TENS: [&str; 10] = [
        "",
        "",
        "dwadzieścia",
        "trzydzieści",
        "czterdzieści",
        "pięćdziesiąt",
        "sześćdziesiąt",
        "siedemdziesiąt",
        "osiemdziesiąt",
        "dziewięćdziesiąt",
    ];
    const HUNDREDS: [&str; 10] = [
        "",
        "sto",
        "dwieście",
        "trzysta",
        "czterysta",
        "pięćset",
        "sześćset",
        "siedemset",
        "osiemset",
        "dziewięćset",
    ];
    // Long scale: singular, 2-4 plural, genitive plural.
    const SCALES: [[&str; 3]; 7] = [
        ["", "", ""],
        ["tysiąc", "tysiące", "tysięcy"],
        ["milion", "miliony", "milionów"],
        ["miliard", "miliardy", "miliardów"],
        ["bilion", "biliony", "bilionów"],
        ["biliard", "biliardy", "biliardów"],
        ["trylion", "tryliony", "trylionów"],
    ];

    pub fn spell(n: u64) -> String {
        if n == 0 {
            return ONES[0].to_string();
        }

        let mut words: Vec<&str> = Vec::new();
        for (scale, &group) in super::groups(n).iter().enumerate().rev() {
            if group == 0 {
                continue;
            }
            if scale > 0 && group == 1 {
                words.push(SCALES[scale][0]);
                continue;
            }
            push_group(group, &mut words);
            if scale > 0 {
                words.push(SCALES[scale][plural_form(group)]);
            }
        }
        words.join(" ")
    }

    fn plural_form(group: u16) -> usize {
        let units = group % 10;
        let tens = (group / 10) % 10;
        if (2..=4).contains(&units) && tens != 1 {
            1
        } else {
            2
        }
    }

    fn push_group(group: u16, words: &mut Vec<&'static str>) {
        let hundreds = (group / 100) as usize;
        let rest = (group % 100) as usize;
        if hundreds > 0 {
            words.push(HUNDREDS[hundreds]);
        }
        if rest >= 20 {
            words.push(TENS[rest / 10]);
            if rest % 10 > 0 {
                words.push(ONES[rest % 10]);
            }
        } else if rest > 0 {
            words.push(ONES[rest]);
        }
    }
}

mod english {
    const ONES: [&str; 20] = [
        "zero",
        "one",
        "two",
        "three",
        "four",
        "five",
        "six",
        "seven",
        "eight",
        "nine",
        "ten",
        "eleven",
        "twelve",
        "thirteen",
        "fourteen",
        "fifteen",
        "sixteen",
        "seventeen",
        "eighteen",
        "nineteen",
    ];
    const TENS: [&str; 10] = [
        "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
    ];
    const SCALES: [&str; 7] = [
        "",
        "thousand",
        "million",
        "billion",
        "trillion",
        "quadrillion",
        "quintillion",
    ];

    pub fn spell(n: u64) -> String {
        if n == 0 {
            return ONES[0].to_string();
        }

        let mut words: Vec<String> = Vec::new();
        for (scale, &group) in super::groups(n).iter().enumerate().rev() {
            if group == 0 {
                continue;
            }
            push_group(group, &mut words);
            if scale > 0 {
                words.push(SCALES[scale].to_string());
            }
        }
        words.join(" ")
    }

    fn push_group(group: u16, words: &mut Vec<String>) {
        let hundreds = (group / 100) as usize;
        let rest = (group % 100) as usize;
        if hundreds > 0 {
            words.push(format!("{} hundred", ONES[hundreds]));
        }
        if rest >= 20 {
            if rest % 10 > 0 {
                words.push(format!("{}-{}", TENS[rest / 10], ONES[rest % 10]));
            } else {
                words.push(TENS[rest / 10].to_string());
            }
        } else if rest > 0 {
            words.push(ONES[rest].to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_digit_runs_and_keeps_everything_else() {
        let en = NumberNormalizer::new(Language::English);
        assert_eq!(
            en.normalize("I have 12 cats and 0 dogs"),
            "I have twelve cats and zero dogs"
        );
        assert_eq!(en.normalize("7,5!  x"), "seven,five!  x");
        assert_eq!(en.normalize("no digits here"), "no digits here");
    }

    #[test]
    fn trailing_run_is_flushed() {
        let pl = NumberNormalizer::new(Language::Polish);
        assert_eq!(pl.normalize("mam 3"), "mam trzy");
    }

    #[test]
    fn overflowing_run_stays_and_processing_continues() {
        let en = NumberNormalizer::new(Language::English);
        assert_eq!(
            en.normalize("99999999999999999999999 then 2"),
            "99999999999999999999999 then two"
        );
    }

    #[test]
    fn non_ascii_numerals_pass_through() {
        let en = NumberNormalizer::new(Language::English);
        assert_eq!(en.normalize("x² 4"), "x² four");
    }

    #[test]
    fn polish_words() {
        let pl = NumberNormalizer::new(Language::Polish);
        assert_eq!(pl.spell(0), "zero");
        assert_eq!(pl.spell(15), "piętnaście");
        assert_eq!(pl.spell(21), "dwadzieścia jeden");
        assert_eq!(pl.spell(105), "sto pięć");
        assert_eq!(pl.spell(1000), "tysiąc");
        assert_eq!(pl.spell(1001), "tysiąc jeden");
        assert_eq!(pl.spell(2000), "dwa tysiące");
        assert_eq!(pl.spell(5000), "pięć tysięcy");
        assert_eq!(pl.spell(12_000), "dwanaście tysięcy");
        assert_eq!(pl.spell(22_000), "dwadzieścia dwa tysiące");
        assert_eq!(pl.spell(1_000_000), "milion");
        assert_eq!(pl.spell(3_000_001), "trzy miliony jeden");
    }

    #[test]
    fn english_words() {
        let en = NumberNormalizer::new(Language::English);
        assert_eq!(en.spell(40), "forty");
        assert_eq!(en.spell(1234), "one thousand two hundred thirty-four");
        assert_eq!(en.spell(1_000_000), "one million");
        assert_eq!(
            en.spell(u64::MAX),
            "eighteen quintillion four hundred forty-six quadrillion seven hundred forty-four \
             trillion seventy-three billion seven hundred nine million five hundred fifty-one \
             thousand six hundred fifteen"
        );
    }
}
