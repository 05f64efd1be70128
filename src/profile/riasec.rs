//! RIASEC 質問票のスコアリング。
//!
//! Each dimension owns eight questions (`r1`..`r8`, `i1`..`i8`, ...). Responses
//! are on a 1-5 scale and are normalised to `[0, 1]` before averaging.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::normalize_response;

pub const RIASEC_DIM: usize = 6;
pub const QUESTIONS_PER_DIMENSION: u32 = 8;

/// Holland の六類型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiasecDimension {
    #[serde(rename = "R")]
    Realistic,
    #[serde(rename = "I")]
    Investigative,
    #[serde(rename = "A")]
    Artistic,
    #[serde(rename = "S")]
    Social,
    #[serde(rename = "E")]
    Enterprising,
    #[serde(rename = "C")]
    Conventional,
}

impl RiasecDimension {
    /// Vector order: R, I, A, S, E, C.
    pub const ALL: [Self; RIASEC_DIM] = [
        Self::Realistic,
        Self::Investigative,
        Self::Artistic,
        Self::Social,
        Self::Enterprising,
        Self::Conventional,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Realistic => 0,
            Self::Investigative => 1,
            Self::Artistic => 2,
            Self::Social => 3,
            Self::Enterprising => 4,
            Self::Conventional => 5,
        }
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Realistic => "R",
            Self::Investigative => "I",
            Self::Artistic => "A",
            Self::Social => "S",
            Self::Enterprising => "E",
            Self::Conventional => "C",
        }
    }

    /// 質問ID（例: `r3`）から対応する次元を引く。表にない ID は `None`。
    #[must_use]
    pub fn for_question(question_id: &str) -> Option<Self> {
        let mut chars = question_id.chars();
        let dimension = match chars.next()? {
            'r' => Self::Realistic,
            'i' => Self::Investigative,
            'a' => Self::Artistic,
            's' => Self::Social,
            'e' => Self::Enterprising,
            'c' => Self::Conventional,
            _ => return None,
        };
        let digits = chars.as_str();
        if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let number: u32 = digits.parse().ok()?;
        (1..=QUESTIONS_PER_DIMENSION)
            .contains(&number)
            .then_some(dimension)
    }
}

/// Scores RIASEC questionnaires.
#[derive(Debug, Default, Clone, Copy)]
pub struct RiasecScorer;

impl RiasecScorer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// 次元ごとの平均スコア（0〜1）を `[R, I, A, S, E, C]` の順で返す。
    /// 回答が一つもない次元は 0.0。
    #[must_use]
    pub fn vector(&self, responses: &HashMap<String, i32>) -> [f64; RIASEC_DIM] {
        let mut sums = [0.0_f64; RIASEC_DIM];
        let mut counts = [0_u32; RIASEC_DIM];

        for (question_id, &response) in responses {
            if let Some(dimension) = RiasecDimension::for_question(question_id) {
                let idx = dimension.index();
                sums[idx] += normalize_response(response);
                counts[idx] += 1;
            }
        }

        let mut vector = [0.0_f64; RIASEC_DIM];
        for (idx, value) in vector.iter_mut().enumerate() {
            if counts[idx] > 0 {
                *value = sums[idx] / f64::from(counts[idx]);
            }
        }
        vector
    }

    /// Named profile keyed by dimension code (`"R"`..`"C"`).
    #[must_use]
    pub fn profile(&self, responses: &HashMap<String, i32>) -> BTreeMap<String, f64> {
        let vector = self.vector(responses);
        RiasecDimension::ALL
            .iter()
            .map(|dimension| (dimension.code().to_string(), vector[dimension.index()]))
            .collect()
    }
}
