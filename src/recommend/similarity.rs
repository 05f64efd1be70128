use crate::dataset::Career;
use crate::profile::{FeatureVector, RIASEC_DIM, SKILL_DIM, SUBJECT_DIM, conform_to_dim};

/// Cosine similarity over the common prefix of `a` and `b`.
///
/// Returns 0.0 when either side has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Produces the vector a career is compared with.
pub trait CareerEmbedder: Send + Sync {
    fn embed(&self, career: &Career) -> Vec<f64>;
}

/// 職業を学生と同じ 20 次元空間に置く埋め込み。
///
/// Uses the career's RIASEC affinities and skill vector; the subject block is zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredEmbedder;

impl CareerEmbedder for StructuredEmbedder {
    fn embed(&self, career: &Career) -> Vec<f64> {
        let riasec: [f64; RIASEC_DIM] = to_array(&career.riasec);
        let skills: [f64; SKILL_DIM] = to_array(&career.skills_vector);
        FeatureVector::from_parts(&riasec, &skills, &[0.0; SUBJECT_DIM]).to_vec()
    }
}

fn to_array<const N: usize>(values: &[f64]) -> [f64; N] {
    let mut out = [0.0; N];
    out.copy_from_slice(&conform_to_dim(values, N));
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCareer<'a> {
    pub career: &'a Career,
    pub similarity: f64,
}

/// Ranks careers by similarity to `user`, highest first.
///
/// Careers without an embedding are skipped. Equal scores keep dataset order.
#[must_use]
pub fn rank_careers<'a>(
    user: &[f64],
    careers: &'a [Career],
    top_k: usize,
) -> Vec<ScoredCareer<'a>> {
    let mut scored: Vec<ScoredCareer<'a>> = careers
        .iter()
        .filter(|career| !career.embedding.is_empty())
        .map(|career| ScoredCareer {
            career,
            similarity: cosine_similarity(user, &career.embedding),
        })
        .collect();
    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn career(id: &str, embedding: Vec<f64>) -> Career {
        Career {
            id: id.to_string(),
            title: id.to_uppercase(),
            description: String::new(),
            riasec: Vec::new(),
            skills: Vec::new(),
            skills_vector: Vec::new(),
            domain: "Unknown".to_string(),
            salary_range: "N/A".to_string(),
            embedding,
        }
    }

    #[test]
    fn cosine_handles_length_mismatch_and_zero_norm() {
        assert!((cosine_similarity(&[1.0, 0.0, 9.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-12);
    }

    #[test]
    fn ranking_is_descending_stable_and_truncated() {
        let careers = vec![
            career("a", vec![0.0, 1.0]),
            career("b", vec![1.0, 0.0]),
            career("empty", Vec::new()),
            career("c", vec![2.0, 0.0]),
            career("d", vec![1.0, 1.0]),
        ];

        let ranked = rank_careers(&[1.0, 0.0], &careers, 3);
        let ids: Vec<&str> = ranked.iter().map(|s| s.career.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
        assert!(ranked[0].similarity >= ranked[2].similarity);
    }

    #[test]
    fn structured_embedding_uses_student_layout() {
        let mut software = career("software", Vec::new());
        software.riasec = vec![0.2, 0.8, 0.3, 0.2, 0.4, 0.5];
        software.skills_vector = vec![0.9; 12];

        let embedding = StructuredEmbedder.embed(&software);
        assert_eq!(embedding.len(), 20);
        assert_eq!(embedding[1], 0.8);
        assert_eq!(embedding[6], 0.9);
        assert_eq!(embedding[15], 0.9);
        assert_eq!(&embedding[16..], &[0.0; 4]);
    }
}
