//! 職業推薦：類似度ランキングとスキルギャップ。

pub mod similarity;
pub mod skill_gap;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::dataset::Career;

pub use similarity::{
    CareerEmbedder, ScoredCareer, StructuredEmbedder, cosine_similarity, rank_careers,
};

/// One ranked career with its skill gaps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub career_id: String,
    pub title: String,
    pub description: String,
    pub similarity_score: f64,
    pub domain: String,
    pub salary_range: String,
    pub required_skills: Vec<String>,
    pub skill_gaps: BTreeMap<String, f64>,
}

/// Ranks careers for a student vector.
pub struct CareerRecommender {
    embedder: Box<dyn CareerEmbedder>,
    careers: Vec<Career>,
}

impl CareerRecommender {
    /// Careers without an embedding get one from `embedder`.
    #[must_use]
    pub fn new(embedder: Box<dyn CareerEmbedder>, mut careers: Vec<Career>) -> Self {
        let mut embedded = 0_usize;
        for career in careers.iter_mut().filter(|career| career.embedding.is_empty()) {
            career.embedding = embedder.embed(career);
            embedded += 1;
        }
        tracing::debug!(careers = careers.len(), embedded, "career catalogue prepared");
        Self { embedder, careers }
    }

    #[must_use]
    pub fn careers(&self) -> &[Career] {
        &self.careers
    }

    #[must_use]
    pub fn embedder(&self) -> &dyn CareerEmbedder {
        self.embedder.as_ref()
    }

    /// 上位 `top_k` 件の推薦を返す。
    ///
    /// `user_skills` falls back to the skill block of `user_vector` when absent or empty.
    #[must_use]
    pub fn recommend(
        &self,
        user_vector: &[f64],
        user_skills: Option<&BTreeMap<String, f64>>,
        top_k: usize,
    ) -> Vec<Recommendation> {
        let extracted;
        let skills = match user_skills {
            Some(skills) if !skills.is_empty() => skills,
            _ => {
                extracted = skill_gap::skills_from_vector(user_vector);
                &extracted
            }
        };

        rank_careers(user_vector, &self.careers, top_k)
            .into_iter()
            .map(|scored| Recommendation {
                career_id: scored.career.id.clone(),
                title: scored.career.title.clone(),
                description: scored.career.description.clone(),
                similarity_score: scored.similarity,
                domain: scored.career.domain.clone(),
                salary_range: scored.career.salary_range.clone(),
                required_skills: scored.career.skills.clone(),
                skill_gaps: skill_gap::skill_gaps(skills, &scored.career.skills),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue() -> Vec<Career> {
        vec![
            Career {
                id: "career_1".to_string(),
                title: "Software Engineer".to_string(),
                description: "Builds software.".to_string(),
                riasec: vec![0.2, 0.8, 0.3, 0.2, 0.4, 0.5],
                skills: vec!["Programming".to_string(), "Problem Solving".to_string()],
                skills_vector: vec![0.9, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1],
                domain: "Tech/Analytical".to_string(),
                salary_range: "N/A".to_string(),
                embedding: Vec::new(),
            },
            Career {
                id: "career_2".to_string(),
                title: "Counselor".to_string(),
                description: "Supports people.".to_string(),
                riasec: vec![0.1, 0.3, 0.4, 0.9, 0.4, 0.2],
                skills: vec!["Communication".to_string(), "Empathy".to_string()],
                skills_vector: vec![0.1, 0.4, 0.9, 0.5, 0.4, 0.3, 0.1, 0.2, 0.7, 0.8],
                domain: "Social/People".to_string(),
                salary_range: "N/A".to_string(),
                embedding: Vec::new(),
            },
        ]
    }

    #[test]
    fn recommends_closest_career_with_gaps_from_vector() {
        let recommender = CareerRecommender::new(Box::new(StructuredEmbedder), catalogue());
        assert!(recommender.careers().iter().all(|c| c.embedding.len() == 20));

        let mut student = vec![0.0; 20];
        student[3] = 1.0;
        student[6 + 2] = 0.9;
        student[6 + 8] = 0.2;

        let recommendations = recommender.recommend(&student, None, 1);
        assert_eq!(recommendations.len(), 1);
        let top = &recommendations[0];
        assert_eq!(top.career_id, "career_2");
        assert!(!top.skill_gaps.contains_key("Communication"));
        assert_eq!(top.skill_gaps.get("Empathy"), Some(&0.6));
    }

    #[test]
    fn explicit_skills_override_vector() {
        let recommender = CareerRecommender::new(Box::new(StructuredEmbedder), catalogue());
        let skills: BTreeMap<String, f64> =
            [("programming".to_string(), 0.1)].into_iter().collect();
        let recommendations = recommender.recommend(&[0.0, 1.0], Some(&skills), 5);

        let engineer = recommendations
            .iter()
            .find(|r| r.career_id == "career_1")
            .unwrap();
        assert_eq!(engineer.skill_gaps.get("Programming"), Some(&0.7));
        assert!(!engineer.skill_gaps.contains_key("Problem Solving"));
    }
}
