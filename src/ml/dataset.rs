//! Synthetic labeled traffic for training and tests
//!
//! Heuristic-labeled generator: malicious connections carry high error
//! rates, low same-service rates and small destination service counts;
//! normal connections the opposite. Deterministic under the seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::schema::FeatureRecord;

const NORMAL_FLAGS: [&str; 3] = ["SF", "S1", "REJ"];
const ATTACK_FLAGS: [&str; 3] = ["S0", "SF", "RSTO"];

/// Generate `n` seeded records with binary labels (1 = malicious).
/// Classes are interleaved and shuffled so any split keeps both.
pub fn generate_labeled_traffic(n: usize, seed: u64) -> (Vec<FeatureRecord>, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pairs: Vec<(FeatureRecord, u8)> = Vec::with_capacity(n);

    for i in 0..n {
        if i % 2 == 0 {
            pairs.push((normal_record(&mut rng), 0));
        } else {
            pairs.push((attack_record(&mut rng), 1));
        }
    }
    pairs.shuffle(&mut rng);

    pairs.into_iter().unzip()
}

fn normal_record(rng: &mut StdRng) -> FeatureRecord {
    FeatureRecord {
        logged_in: rng.gen_bool(0.8),
        count: rng.gen_range(1..80),
        serror_rate: rng.gen_range(0.0..0.15),
        srv_serror_rate: rng.gen_range(0.0..0.15),
        same_srv_rate: rng.gen_range(0.7..1.0),
        dst_host_srv_count: rng.gen_range(40..255),
        dst_host_same_srv_rate: rng.gen_range(0.7..1.0),
        dst_host_serror_rate: rng.gen_range(0.0..0.15),
        dst_host_srv_serror_rate: rng.gen_range(0.0..0.15),
        flag: NORMAL_FLAGS[rng.gen_range(0..NORMAL_FLAGS.len())].to_string(),
    }
}

fn attack_record(rng: &mut StdRng) -> FeatureRecord {
    FeatureRecord {
        logged_in: rng.gen_bool(0.1),
        count: rng.gen_range(50..400),
        serror_rate: rng.gen_range(0.6..1.0),
        srv_serror_rate: rng.gen_range(0.6..1.0),
        same_srv_rate: rng.gen_range(0.0..0.3),
        dst_host_srv_count: rng.gen_range(0..25),
        dst_host_same_srv_rate: rng.gen_range(0.0..0.3),
        dst_host_serror_rate: rng.gen_range(0.6..1.0),
        dst_host_srv_serror_rate: rng.gen_range(0.6..1.0),
        flag: ATTACK_FLAGS[rng.gen_range(0..ATTACK_FLAGS.len())].to_string(),
    }
}
