use maturity_core::{CoreError, Question, QuestionCatalog, load_catalog};

fn question(id: &str, theme: &str, weight: u8) -> Question {
    Question {
        id: id.to_string(),
        theme: theme.to_string(),
        profiles: ["all".to_string()].into_iter().collect(),
        text: format!("Question {id}?"),
        weight,
        category: None,
    }
}

#[test]
fn builtin_catalog_has_six_themes_and_thirty_questions() {
    let catalog = QuestionCatalog::builtin();
    assert_eq!(catalog.themes.len(), 6);
    assert_eq!(catalog.questions.len(), 30);
    assert_eq!(catalog.themes[0], "Gouvernance & Organisation");
    for theme in &catalog.themes {
        assert_eq!(catalog.questions_for_theme(theme).count(), 5, "{theme}");
    }
}

#[test]
fn custom_catalog_skips_invalid_entries() {
    let json = r#"[
        {"id": "a1", "theme": "Alpha", "profiles": ["dev"], "question": "Ok?", "weight": 2},
        {"id": "a2", "theme": "Alpha", "profiles": "dev", "question": "Bad profiles", "weight": 2},
        {"id": "b1", "theme": "Beta", "profiles": ["all"], "question": "Ok too?", "weight": 3, "category": "x"},
        {"id": "b2", "theme": "Beta", "profiles": ["all"], "question": "No weight"},
        {"id": "b3", "theme": "Beta", "profiles": ["all"], "question": "Too heavy", "weight": 9},
        {"theme": "Beta", "profiles": ["all"], "question": "No id", "weight": 1}
    ]"#;

    let catalog = QuestionCatalog::from_questions_json(json).unwrap();
    let ids: Vec<_> = catalog.questions.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, ["a1", "b1"]);
    assert_eq!(catalog.themes, ["Alpha", "Beta"]);
    assert_eq!(catalog.question("b1").unwrap().category.as_deref(), Some("x"));
}

#[test]
fn custom_catalog_must_be_an_array() {
    let err = QuestionCatalog::from_questions_json(r#"{"questions": []}"#).unwrap_err();
    assert!(matches!(err, CoreError::InvalidCatalog(_)));
}

#[test]
fn custom_catalog_with_no_valid_entry_fails() {
    let err = QuestionCatalog::from_questions_json(r#"[{"id": "x"}]"#).unwrap_err();
    assert!(matches!(err, CoreError::InvalidCatalog(_)));
}

#[test]
fn missing_or_broken_catalog_file_falls_back_to_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    assert_eq!(load_catalog(Some(&missing)), QuestionCatalog::builtin());

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "not json").unwrap();
    assert_eq!(load_catalog(Some(&broken)), QuestionCatalog::builtin());

    assert_eq!(load_catalog(None), QuestionCatalog::builtin());
}

#[test]
fn custom_catalog_file_is_used_when_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    let catalog = QuestionCatalog::from_questions(vec![question("q1", "T", 2)]);
    std::fs::write(&path, catalog.to_questions_json().unwrap()).unwrap();

    assert_eq!(load_catalog(Some(&path)), catalog);
}

#[test]
fn add_question_rejects_duplicate_id() {
    let mut catalog = QuestionCatalog::from_questions(vec![question("q1", "T", 2)]);
    let err = catalog.add_question(question("q1", "U", 1)).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateQuestion(id) if id == "q1"));

    catalog.add_question(question("q2", "U", 1)).unwrap();
    assert_eq!(catalog.themes, ["T", "U"]);
}

#[test]
fn update_question_checks_id_collisions() {
    let mut catalog =
        QuestionCatalog::from_questions(vec![question("q1", "T", 2), question("q2", "T", 3)]);

    let err = catalog.update_question("q1", question("q2", "T", 1)).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateQuestion(_)));

    catalog.update_question("q1", question("q1b", "V", 1)).unwrap();
    assert!(catalog.question("q1").is_none());
    assert_eq!(catalog.question("q1b").unwrap().weight, 1);
    assert_eq!(catalog.themes, ["T", "V"]);

    let err = catalog.update_question("zz", question("zz", "T", 1)).unwrap_err();
    assert!(matches!(err, CoreError::UnknownQuestion(_)));
}

#[test]
fn removing_last_question_of_a_theme_drops_the_theme() {
    let mut catalog =
        QuestionCatalog::from_questions(vec![question("q1", "T", 2), question("q2", "U", 3)]);
    catalog.remove_question("q1").unwrap();
    assert_eq!(catalog.themes, ["U"]);
}

#[test]
fn move_question_reorders() {
    let mut catalog = QuestionCatalog::from_questions(vec![
        question("q1", "T", 1),
        question("q2", "T", 1),
        question("q3", "T", 1),
    ]);
    catalog.move_question(0, 2).unwrap();
    let ids: Vec<_> = catalog.questions.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, ["q2", "q3", "q1"]);
    assert!(catalog.move_question(0, 3).is_err());
}

#[test]
fn profile_filter_includes_all_tag() {
    let mut dev_only = question("d", "T", 1);
    dev_only.profiles = ["developer".to_string()].into_iter().collect();
    let catalog = QuestionCatalog::from_questions(vec![dev_only, question("a", "T", 1)]);

    let for_dev: Vec<_> = catalog.questions_for_profile("developer").map(|q| &q.id).collect();
    let for_qa: Vec<_> = catalog.questions_for_profile("qa").map(|q| &q.id).collect();
    assert_eq!(for_dev.len(), 2);
    assert_eq!(for_qa, ["a"]);
}
