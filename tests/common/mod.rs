use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Five archetypes in the 20-D student layout, ten noisy students each.
pub fn synthetic_students(per_archetype: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut students = Vec::with_capacity(per_archetype * 5);
    for archetype in 0..5 {
        for _ in 0..per_archetype {
            let vector: Vec<f64> = (0..20)
                .map(|dim| {
                    let base = if dim % 5 == archetype { 0.85 } else { 0.2 };
                    (base + rng.random_range(-0.1..0.1_f64)).clamp(0.0, 1.0)
                })
                .collect();
            students.push(vector);
        }
    }
    students
}
