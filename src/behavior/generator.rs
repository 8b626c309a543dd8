//! Population-level trait generation.
//!
//! Two modes: `realistic` scatters each agent around send/reply averages
//! observed on real per-user messaging traffic, `ranged` draws every
//! probability uniformly from the configured bounds. Each generated model
//! receives an independent RNG stream seeded from the master stream, so a
//! fixed master seed reproduces the whole population.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::human::HumanTraits;
use crate::config::{TraitsConfig, TraitsMode};
use crate::protocol::BehaviorParams;

/// Per-user send probabilities measured on real messaging traffic.
const OBSERVED_SEND_PROBABILITIES: [f64; 11] = [
    0.375, 0.584, 0.751, 0.285, 0.182, 0.200, 0.380, 0.357, 0.181, 0.184, 0.161,
];

/// Per-user reply probabilities measured on the same traffic.
const OBSERVED_REPLY_PROBABILITIES: [f64; 11] = [
    0.452, 0.334, 0.387, 0.464, 0.249, 0.432, 0.843, 0.735, 0.180, 0.279, 0.380,
];

/// Width of the scatter around the observed averages.
const OBSERVED_SPREAD: f64 = 0.2;

/// Bump applied to realistic reply probabilities so simulated conversations
/// sustain themselves instead of dying out.
const REPLY_BUMP: f64 = 0.2;

/// Generate one behavior model per agent.
pub fn generate_traits(count: usize, cfg: &TraitsConfig, rng: &mut StdRng) -> Vec<HumanTraits> {
    (0..count)
        .map(|i| {
            let (send, reply) = match cfg.mode {
                TraitsMode::Realistic => realistic_probabilities(rng),
                TraitsMode::Ranged => (
                    cfg.send_probability.sample(rng),
                    cfg.response_probability.sample(rng),
                ),
            };

            let params = BehaviorParams {
                send_probability: send,
                response_probability: reply,
                deniable_probability: cfg.deniable_probability.sample(rng),
                burst_modifier: cfg.burst_modifier,
                deniable_burst_size: cfg.deniable_burst_size,
                mean_delay_secs: cfg.mean_delay_secs,
            };

            let agent_rng = StdRng::seed_from_u64(rng.gen());
            HumanTraits::new(i.to_string(), params, cfg.delay.delay_fn(), agent_rng)
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Scatter one agent around the observed averages, keeping its reply
/// probability above its send probability.
fn realistic_probabilities(rng: &mut StdRng) -> (f64, f64) {
    let send_avg = mean(&OBSERVED_SEND_PROBABILITIES);
    let reply_avg = mean(&OBSERVED_REPLY_PROBABILITIES);

    let send = (rng.gen::<f64>() * OBSERVED_SPREAD + (send_avg - OBSERVED_SPREAD / 2.0))
        .clamp(0.0, 1.0);
    let mut reply = rng.gen::<f64>() * OBSERVED_SPREAD + (reply_avg - OBSERVED_SPREAD / 2.0);
    while reply <= send {
        reply += 0.1 * rng.gen::<f64>();
    }

    (send, (reply + REPLY_BUMP).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Behavior;
    use crate::config::ProbabilityRange;

    fn ranged_config() -> TraitsConfig {
        TraitsConfig {
            mode: TraitsMode::Ranged,
            send_probability: ProbabilityRange { min: 0.2, max: 0.4 },
            response_probability: ProbabilityRange { min: 0.5, max: 0.7 },
            deniable_probability: ProbabilityRange { min: 0.1, max: 0.1 },
            ..TraitsConfig::default()
        }
    }

    #[test]
    fn test_generates_requested_count() {
        let mut rng = StdRng::seed_from_u64(1);
        let traits = generate_traits(25, &TraitsConfig::default(), &mut rng);
        assert_eq!(traits.len(), 25);
    }

    #[test]
    fn test_realistic_probabilities_are_valid_and_reply_heavy() {
        let mut rng = StdRng::seed_from_u64(42);
        for traits in generate_traits(100, &TraitsConfig::default(), &mut rng) {
            let p = traits.params();
            assert!((0.0..=1.0).contains(&p.send_probability));
            assert!((0.0..=1.0).contains(&p.response_probability));
            assert!((0.0..=1.0).contains(&p.deniable_probability));
            assert!(
                p.response_probability >= p.send_probability,
                "reply {} below send {}",
                p.response_probability,
                p.send_probability
            );
        }
    }

    #[test]
    fn test_ranged_mode_respects_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for traits in generate_traits(100, &ranged_config(), &mut rng) {
            let p = traits.params();
            assert!((0.2..=0.4).contains(&p.send_probability));
            assert!((0.5..=0.7).contains(&p.response_probability));
            assert!((p.deniable_probability - 0.1).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_master_seed_reproduces_population() {
        let generate = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            generate_traits(10, &TraitsConfig::default(), &mut rng)
                .iter()
                .map(|t| t.params())
                .collect::<Vec<_>>()
        };
        assert_eq!(generate(9), generate(9));
    }
}
