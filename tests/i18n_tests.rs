use stockgrid::state::i18n::{self, Language};
use stockgrid::state::notice::Notice;
use std::collections::BTreeSet;

#[test]
fn test_default_language_is_english() {
    assert_eq!(Language::default(), Language::En);
    assert_eq!(i18n::tr(Language::default(), "notice.price_updated"), "Price updated");
}

#[test]
fn test_language_switch_changes_notice_text() {
    assert_eq!(i18n::tr(Language::En, "notice.photo_updated"), "Photo updated");
    assert_eq!(i18n::tr(Language::Ru, "notice.photo_updated"), "Фото обновлено");
}

#[test]
fn test_unknown_key_is_returned_verbatim() {
    assert_eq!(i18n::tr(Language::Ru, "notice.does_not_exist"), "notice.does_not_exist");
}

#[test]
fn test_language_code_roundtrip() {
    for language in Language::all() {
        assert_eq!(Language::from_code(language.code()), Some(*language));
    }
    assert_eq!(Language::from_code("unknown"), None);
}

#[test]
fn test_notice_renders_count() {
    let notice = Notice::success("notice.bulk_deleted").with_count(4);
    assert_eq!(notice.render(Language::En), "Products deleted: 4");
    assert_eq!(notice.render(Language::Ru), "Удалено товаров: 4");
    assert!(!notice.is_error());
}

#[test]
fn test_format_fills_placeholders() {
    let args = [("count", "7".to_string())];
    assert_eq!(
        i18n::format(Language::En, "notice.bulk_status_updated", &args),
        "Statuses updated: 7"
    );
    assert_eq!(
        i18n::format(Language::Ru, "notice.bulk_status_updated", &args),
        "Статусы обновлены: 7"
    );
    assert_eq!(
        i18n::format(Language::En, "notice.bulk_deleted", &[]),
        "Products deleted: {count}"
    );
    assert_eq!(
        i18n::format(Language::En, "notice.photo_updated", &args),
        "Photo updated"
    );
}

#[test]
fn test_language_code_is_case_insensitive() {
    assert_eq!(Language::from_code(" RU "), Some(Language::Ru));
    assert_eq!(serde_json::to_string(&Language::Ru).unwrap(), "\"ru\"");
}

#[test]
fn test_ru_catalog_matches_english_keys() {
    let en: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(include_str!("../assets/i18n/en.json"))
            .expect("en.json should be valid JSON object");
    let ru: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(include_str!("../assets/i18n/ru.json"))
            .expect("ru.json should be valid JSON object");

    let en_keys: BTreeSet<&str> = en.keys().map(String::as_str).collect();
    let ru_keys: BTreeSet<&str> = ru.keys().map(String::as_str).collect();

    let missing: Vec<&str> = en_keys.symmetric_difference(&ru_keys).copied().collect();
    assert!(
        missing.is_empty(),
        "catalogs differ in keys: {}",
        missing.join(", ")
    );
}
