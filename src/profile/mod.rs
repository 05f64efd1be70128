//! Questionnaire responses → fixed 20-dimensional feature vectors.
//!
//! Layout: `[0, 6)` RIASEC, `[6, 16)` skills, `[16, 20)` subject preferences.

pub mod riasec;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

pub use riasec::{RIASEC_DIM, RiasecDimension, RiasecScorer};

pub const SKILL_DIM: usize = 10;
pub const SUBJECT_DIM: usize = 4;
pub const FEATURE_DIM: usize = RIASEC_DIM + SKILL_DIM + SUBJECT_DIM;

pub const SKILL_OFFSET: usize = RIASEC_DIM;
pub const SUBJECT_OFFSET: usize = RIASEC_DIM + SKILL_DIM;

/// スキル名とベクトル上の位置。
pub const SKILL_NAMES: [&str; SKILL_DIM] = [
    "programming",
    "problem_solving",
    "communication",
    "creativity",
    "leadership",
    "analytical",
    "mathematics",
    "design",
    "research",
    "teamwork",
];

pub const SUBJECT_NAMES: [&str; SUBJECT_DIM] = ["stem", "arts", "business", "social_sciences"];

/// Maps a 1-5 Likert response onto `[0, 1]`. Out-of-range answers are clamped.
#[must_use]
pub fn normalize_response(response: i32) -> f64 {
    f64::from(response.clamp(1, 5) - 1) / 4.0
}

/// Zero-pads or truncates `vector` to exactly `dim` elements.
#[must_use]
pub fn conform_to_dim(vector: &[f64], dim: usize) -> Vec<f64> {
    let mut out = vec![0.0; dim];
    let len = vector.len().min(dim);
    out[..len].copy_from_slice(&vector[..len]);
    out
}

/// 学生一人分の 20 次元特徴ベクトル。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector([f64; FEATURE_DIM]);

impl FeatureVector {
    #[must_use]
    pub fn zeros() -> Self {
        Self([0.0; FEATURE_DIM])
    }

    #[must_use]
    pub fn from_parts(
        riasec: &[f64; RIASEC_DIM],
        skills: &[f64; SKILL_DIM],
        subjects: &[f64; SUBJECT_DIM],
    ) -> Self {
        let mut values = [0.0; FEATURE_DIM];
        values[..SKILL_OFFSET].copy_from_slice(riasec);
        values[SKILL_OFFSET..SUBJECT_OFFSET].copy_from_slice(skills);
        values[SUBJECT_OFFSET..].copy_from_slice(subjects);
        Self(values)
    }

    /// Builds a vector from an arbitrary-length slice, padding or truncating.
    #[must_use]
    pub fn from_slice_lossy(values: &[f64]) -> Self {
        let mut out = [0.0; FEATURE_DIM];
        let len = values.len().min(FEATURE_DIM);
        out[..len].copy_from_slice(&values[..len]);
        Self(out)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn riasec(&self) -> &[f64] {
        &self.0[..SKILL_OFFSET]
    }

    #[must_use]
    pub fn skills(&self) -> &[f64] {
        &self.0[SKILL_OFFSET..SUBJECT_OFFSET]
    }

    #[must_use]
    pub fn subjects(&self) -> &[f64] {
        &self.0[SUBJECT_OFFSET..]
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}

/// Raw questionnaire payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireResponses {
    #[serde(default)]
    pub riasec_responses: HashMap<String, i32>,
    #[serde(default)]
    pub skill_responses: HashMap<String, i32>,
    #[serde(default)]
    pub subject_preferences: HashMap<String, i32>,
}

/// プロファイル処理の結果一式。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledProfile {
    pub riasec_profile: BTreeMap<String, f64>,
    pub riasec_vector: Vec<f64>,
    pub skill_vector: Vec<f64>,
    pub subject_vector: Vec<f64>,
    pub combined_vector: FeatureVector,
    pub skills: BTreeMap<String, i32>,
}

/// Combines RIASEC, skill and subject answers into one [`FeatureVector`].
#[derive(Debug, Default, Clone, Copy)]
pub struct VectorAssembler {
    scorer: RiasecScorer,
}

impl VectorAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scorer: RiasecScorer::new(),
        }
    }

    #[must_use]
    pub fn skill_vector(&self, responses: &HashMap<String, i32>) -> [f64; SKILL_DIM] {
        average_by_name(responses, &SKILL_NAMES)
    }

    #[must_use]
    pub fn subject_vector(&self, responses: &HashMap<String, i32>) -> [f64; SUBJECT_DIM] {
        average_by_name(responses, &SUBJECT_NAMES)
    }

    #[must_use]
    pub fn combined_vector(&self, responses: &QuestionnaireResponses) -> FeatureVector {
        FeatureVector::from_parts(
            &self.scorer.vector(&responses.riasec_responses),
            &self.skill_vector(&responses.skill_responses),
            &self.subject_vector(&responses.subject_preferences),
        )
    }

    #[must_use]
    pub fn assemble(&self, responses: &QuestionnaireResponses) -> AssembledProfile {
        let riasec = self.scorer.vector(&responses.riasec_responses);
        let skills = self.skill_vector(&responses.skill_responses);
        let subjects = self.subject_vector(&responses.subject_preferences);
        let riasec_profile = RiasecDimension::ALL
            .iter()
            .map(|dimension| (dimension.code().to_string(), riasec[dimension.index()]))
            .collect();

        AssembledProfile {
            riasec_profile,
            riasec_vector: riasec.to_vec(),
            skill_vector: skills.to_vec(),
            subject_vector: subjects.to_vec(),
            combined_vector: FeatureVector::from_parts(&riasec, &skills, &subjects),
            skills: responses
                .skill_responses
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect(),
        }
    }
}

fn average_by_name<const N: usize>(
    responses: &HashMap<String, i32>,
    names: &[&str; N],
) -> [f64; N] {
    let mut sums = [0.0_f64; N];
    let mut counts = [0_u32; N];
    for (name, &response) in responses {
        if let Some(idx) = names.iter().position(|candidate| candidate == name) {
            sums[idx] += normalize_response(response);
            counts[idx] += 1;
        }
    }
    let mut out = [0.0_f64; N];
    for (idx, value) in out.iter_mut().enumerate() {
        if counts[idx] > 0 {
            *value = sums[idx] / f64::from(counts[idx]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, i32)]) -> HashMap<String, i32> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn empty_responses_yield_zero_vector() {
        let assembler = VectorAssembler::new();
        let vector = assembler.combined_vector(&QuestionnaireResponses::default());
        assert_eq!(vector, FeatureVector::zeros());
        assert_eq!(vector.as_slice().len(), FEATURE_DIM);
    }

    #[test]
    fn layout_places_each_group_at_its_offset() {
        let assembler = VectorAssembler::new();
        let responses = QuestionnaireResponses {
            riasec_responses: map(&[("c1", 5)]),
            skill_responses: map(&[("teamwork", 5), ("unknown_skill", 5)]),
            subject_preferences: map(&[("stem", 3)]),
        };

        let vector = assembler.combined_vector(&responses);

        assert_eq!(vector.riasec()[5], 1.0);
        assert_eq!(vector.skills()[9], 1.0);
        assert_eq!(vector.subjects()[0], 0.5);
        let non_zero = vector.as_slice().iter().filter(|v| **v != 0.0).count();
        assert_eq!(non_zero, 3);
    }

    #[test]
    fn out_of_range_responses_are_clamped() {
        assert_eq!(normalize_response(0), 0.0);
        assert_eq!(normalize_response(9), 1.0);
        assert_eq!(normalize_response(3), 0.5);
    }

    #[test]
    fn assemble_reports_named_profile_and_raw_skills() {
        let assembler = VectorAssembler::new();
        let responses = QuestionnaireResponses {
            riasec_responses: map(&[("i1", 5), ("i2", 4)]),
            skill_responses: map(&[("programming", 4)]),
            subject_preferences: HashMap::new(),
        };

        let profile = assembler.assemble(&responses);

        assert!((profile.riasec_profile["I"] - 0.875).abs() < 1e-12);
        assert_eq!(profile.riasec_vector.len(), RIASEC_DIM);
        assert_eq!(profile.skill_vector.len(), SKILL_DIM);
        assert_eq!(profile.subject_vector.len(), SUBJECT_DIM);
        assert_eq!(profile.skills.get("programming"), Some(&4));
        assert_eq!(profile.combined_vector.skills()[0], 0.75);
    }

    #[test]
    fn conform_pads_and_truncates() {
        assert_eq!(conform_to_dim(&[1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(conform_to_dim(&[1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
        assert_eq!(
            FeatureVector::from_slice_lossy(&[0.5; 30]).as_slice(),
            &[0.5; FEATURE_DIM]
        );
    }
}
