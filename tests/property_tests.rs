/// Property-based tests using proptest
/// Invariants of the phone normalization and extraction logic
use geodesist_dispatch::phone::{extract_phone, normalize_phone};
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalization_never_panics(input in "\\PC*") {
        let _ = normalize_phone(&input);
    }

    #[test]
    fn extraction_never_panics(input in "\\PC*") {
        let _ = extract_phone(&input);
    }

    #[test]
    fn normalized_output_is_digits_only(input in "\\PC*") {
        let out = normalize_phone(&input);
        prop_assert!(out.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn normalization_is_idempotent(input in "\\PC*") {
        let once = normalize_phone(&input);
        prop_assert_eq!(normalize_phone(&once), once);
    }

    #[test]
    fn eleven_digit_domestic_numbers_get_the_seven_prefix(rest in "[0-9]{10}") {
        let domestic = format!("8{}", rest);
        let normalized = normalize_phone(&domestic);
        prop_assert_eq!(normalized, format!("7{}", rest));
    }

    #[test]
    fn formatting_noise_does_not_change_the_digits(rest in "[0-9]{10}") {
        let pretty = format!(
            "+7 ({}) {}-{}-{}",
            &rest[0..3], &rest[3..6], &rest[6..8], &rest[8..10]
        );
        prop_assert_eq!(normalize_phone(&pretty), format!("7{}", rest));
    }

    #[test]
    fn extraction_finds_a_planted_phone(
        prefix in "[а-яА-Яa-zA-Z ]{0,20}",
        rest in "[0-9]{10}"
    ) {
        let text = format!("{}, тел +7 {} ", prefix, rest);
        prop_assert_eq!(extract_phone(&text), format!("7{}", rest));
    }

    #[test]
    fn extraction_of_digit_free_text_is_empty(input in "[а-яА-Яa-zA-Z ,.]*") {
        prop_assert_eq!(extract_phone(&input), "");
    }
}
