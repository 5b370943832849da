use giveaway_bot::utils::datetime::normalize_end_date;
use giveaway_bot::utils::validation::*;

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_valid_titles() {
        let valid_titles = vec![
            "Weekly drop".to_string(),
            "🎁 AWM skin giveaway".to_string(),
            "A".to_string(),
            "A".repeat(MAX_TITLE_LEN),
        ];

        for title in valid_titles {
            assert!(validate_title(Some(&title)).is_ok(), "Should accept title: {}", title);
        }
    }

    #[test]
    fn test_invalid_titles() {
        let invalid_titles = vec![
            "".to_string(),
            "   ".to_string(),
            "A".repeat(MAX_TITLE_LEN + 1),
            "Two\nlines".to_string(),
        ];

        for title in invalid_titles {
            assert!(validate_title(Some(&title)).is_err(), "Should reject title: {:?}", title);
        }
        assert!(validate_title(None).is_err());
    }

    #[test]
    fn test_title_whitespace_handling() {
        assert_eq!(validate_title(Some("  Valid Title  ")).unwrap(), "Valid Title");
    }

    #[test]
    fn test_description_blank_is_absent() {
        assert_eq!(validate_description(Some("   ")).unwrap(), None);
        assert_eq!(validate_description(None).unwrap(), None);
        assert_eq!(validate_description(Some(" Prize pool ")).unwrap().as_deref(), Some("Prize pool"));
        assert!(validate_description(Some(&"x".repeat(MAX_DESCRIPTION_LEN + 1))).is_err());
    }

    #[test]
    fn test_winners_count_bounds() {
        assert_eq!(validate_winners_count(None).unwrap(), 1);
        assert_eq!(validate_winners_count(Some(MAX_WINNERS)).unwrap(), MAX_WINNERS);
        assert!(validate_winners_count(Some(0)).is_err());
        assert!(validate_winners_count(Some(-3)).is_err());
        assert!(validate_winners_count(Some(MAX_WINNERS + 1)).is_err());
    }

    #[test]
    fn test_prizes_fit_places() {
        let prizes = vec![" AWM ".to_string(), "M416".to_string()];
        assert_eq!(validate_prizes(&prizes, 2).unwrap(), vec!["AWM", "M416"]);
        assert!(validate_prizes(&prizes, 1).is_err());
        assert!(validate_prizes(&["".to_string()], 3).is_err());
        assert!(validate_prizes(&[], 1).unwrap().is_empty());
    }

    #[test]
    fn test_user_ids() {
        assert_eq!(validate_user_id(Some(123456789)).unwrap(), 123456789);
        assert!(validate_user_id(None).is_err());
        assert!(validate_user_id(Some(0)).is_err());
        assert!(validate_user_id(Some(-5)).is_err());
    }

    #[test]
    fn test_form_fields_accept_numbers_and_text() {
        assert_eq!(validate_required_field("game_id", Some(&FieldValue::Number(51))).unwrap(), "51");
        assert_eq!(
            validate_required_field("nickname", Some(&FieldValue::Text("  Ace ".to_string()))).unwrap(),
            "Ace"
        );
        assert!(validate_required_field("nickname", Some(&FieldValue::Text(" ".to_string()))).is_err());
        assert!(validate_required_field("nickname", None).is_err());
        assert!(validate_required_field("nickname", Some(&FieldValue::Text("x".repeat(MAX_FIELD_LEN + 1)))).is_err());
    }

    #[test]
    fn test_age() {
        assert_eq!(validate_age(Some(&FieldValue::Text("18".to_string()))).unwrap(), 18);
        assert_eq!(validate_age(Some(&FieldValue::Number(30))).unwrap(), 30);
        assert!(validate_age(Some(&FieldValue::Number(0))).is_err());
        assert!(validate_age(Some(&FieldValue::Number(121))).is_err());
        assert!(validate_age(Some(&FieldValue::Text("eighteen".to_string()))).is_err());
        assert!(validate_age(None).is_err());
    }

    #[test]
    fn test_dates_normalize_to_utc() {
        assert_eq!(
            normalize_end_date(Some("2024-12-31 18:00")).unwrap().as_deref(),
            Some("2024-12-31T18:00:00Z")
        );
        assert_eq!(
            normalize_end_date(Some("2024-12-31T20:00:00+02:00")).unwrap().as_deref(),
            Some("2024-12-31T18:00:00Z")
        );
        assert_eq!(normalize_end_date(Some("  ")).unwrap(), None);
        assert!(normalize_end_date(Some("tomorrow")).is_err());
    }
}
