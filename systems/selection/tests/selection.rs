use pet_panda_core::{Activity, Vitals};
use pet_panda_system_selection::{
    choose_activity, choose_index, choose_shoot, pick, shoot_weights, ShootPreference,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const TRIALS: usize = 20_000;

fn frequencies(weights: &[f64], seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut counts = vec![0_usize; weights.len()];
    for _ in 0..TRIALS {
        let index = choose_index(&mut rng, weights).expect("non-empty weights always choose");
        counts[index] += 1;
    }
    counts
        .into_iter()
        .map(|count| count as f64 / TRIALS as f64)
        .collect()
}

#[test]
fn empirical_frequencies_follow_weights() {
    let weights = [1.0, 3.0, 6.0];
    let total: f64 = weights.iter().sum();

    let observed = frequencies(&weights, 0x5eed_0001);

    for (weight, frequency) in weights.iter().zip(observed) {
        let expected = weight / total;
        assert!(
            (frequency - expected).abs() < 0.02,
            "expected frequency near {expected}, observed {frequency}"
        );
    }
}

#[test]
fn zero_weight_is_never_chosen() {
    let observed = frequencies(&[2.0, 0.0, 5.0], 0x5eed_0002);

    assert_eq!(observed[1], 0.0, "zero-weight item must be excluded");
}

#[test]
fn equal_weights_are_equally_likely() {
    let observed = frequencies(&[4.0, 4.0], 0x5eed_0003);

    assert!((observed[0] - observed[1]).abs() < 0.03);
}

#[test]
fn all_zero_weights_fall_back_to_uniform_choice() {
    let observed = frequencies(&[0.0, 0.0, 0.0, 0.0], 0x5eed_0004);

    for frequency in observed {
        assert!(
            (frequency - 0.25).abs() < 0.02,
            "uniform fallback expected, observed {frequency}"
        );
    }
}

#[test]
fn pick_returns_an_identifier_from_the_input() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let options = [("bamboo", 0.0), ("nap", 2.0), ("stroll", 1.0)];

    for _ in 0..1_000 {
        let chosen = pick(&mut rng, &options).expect("options are non-empty");
        assert!(["nap", "stroll"].contains(chosen), "picked {chosen}");
    }
}

#[test]
fn shortest_preference_favours_the_small_shoot() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_0005);
    let sizes = [10, 100];
    let mut small = 0_usize;
    let mut large = 0_usize;

    for _ in 0..TRIALS {
        match choose_shoot(&mut rng, &sizes, ShootPreference::Shortest) {
            Some(0) => small += 1,
            Some(1) => large += 1,
            other => panic!("unexpected choice {other:?}"),
        }
    }

    assert!(
        small > large,
        "small shoot chosen {small} times, large {large} times"
    );
}

#[test]
fn tallest_preference_favours_the_large_shoot() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_0006);
    let sizes = [10, 100];
    let mut large = 0_usize;

    for _ in 0..TRIALS {
        if choose_shoot(&mut rng, &sizes, ShootPreference::Tallest) == Some(1) {
            large += 1;
        }
    }

    assert!(large > TRIALS * 3 / 4, "large shoot chosen {large} times");
}

#[test]
fn identical_shoots_never_fail_when_inverted() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_0007);

    for _ in 0..1_000 {
        let chosen = choose_shoot(&mut rng, &[0, 0, 0], ShootPreference::Shortest)
            .expect("collapsed weights fall back to a uniform choice");
        assert!(chosen < 3);
    }
}

#[test]
fn single_shoot_is_always_chosen() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_0008);

    for preference in [ShootPreference::Tallest, ShootPreference::Shortest] {
        assert_eq!(choose_shoot(&mut rng, &[42], preference), Some(0));
    }
}

#[test]
fn jitter_stays_within_one_to_two_times_size() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_0009);
    let sizes = [5, 50, 500];

    for _ in 0..1_000 {
        let weights = shoot_weights(&mut rng, &sizes, ShootPreference::Tallest);
        for (size, weight) in sizes.iter().zip(weights) {
            let size = f64::from(*size);
            assert!(weight >= size && weight < size * 2.0);
        }
    }
}

#[test]
fn hungry_panda_almost_always_eats() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_000a);
    let vitals = Vitals::new(100, 0, 0);
    let mut eating = 0_usize;

    for _ in 0..TRIALS {
        match choose_activity(&mut rng, vitals) {
            Activity::Eating => eating += 1,
            Activity::Idle => {}
            other => panic!("zero-weight activity {other} was chosen"),
        }
    }

    let share = eating as f64 / TRIALS as f64;
    let expected = 100.0 / 101.0;
    assert!(
        (share - expected).abs() < 0.01,
        "eating share {share}, expected near {expected}"
    );
}

#[test]
fn content_panda_stays_idle() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_000b);

    for _ in 0..1_000 {
        assert_eq!(
            choose_activity(&mut rng, Vitals::default()),
            Activity::Idle
        );
    }
}

#[test]
fn each_need_weighs_its_own_activity() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_000c);
    let cases = [
        (Vitals::new(1_000, 0, 0), Activity::Eating),
        (Vitals::new(0, 1_000, 0), Activity::Resting),
        (Vitals::new(0, 0, 1_000), Activity::Walking),
    ];

    for (vitals, expected) in cases {
        let hits = (0..1_000)
            .filter(|_| choose_activity(&mut rng, vitals) == expected)
            .count();
        assert!(hits >= 980, "{expected} chosen {hits} times for {vitals:?}");
    }
}
