#![forbid(unsafe_code)]

//! End-to-end language lifecycle: seed → translate → switch → reload →
//! restart, the way an application wires the pieces together.

use std::cell::RefCell;
use std::rc::Rc;

use lumo_i18n::{
    JsonFileLoader, LanguageState, LocaleSource, MultiLang, ReloadPlan, Translation,
    TranslatorHost, Variants,
};
use lumo_state::{MemoryStore, StoreHandle};

struct FixedLocale(&'static str);
impl LocaleSource for FixedLocale {
    fn current(&self) -> Option<String> {
        Some(self.0.to_owned())
    }
}

fn default_dico() -> Translation {
    [
        ("title", Variants::from("Inbox")),
        ("greeting", Variants::from("Hi $1, you have $2 messages")),
    ]
    .into_iter()
    .collect()
}

fn french_dico() -> Translation {
    [
        ("title", Variants::from("Boîte de réception")),
        ("greeting", Variants::from("Salut $1, tu as $2 messages")),
    ]
    .into_iter()
    .collect()
}

#[test]
fn full_lifecycle_with_persisted_language() {
    let store: StoreHandle = Rc::new(MemoryStore::new());

    // First launch: platform says German, nothing persisted.
    {
        let language = Rc::new(LanguageState::new(Rc::clone(&store), &FixedLocale("de-DE")));
        assert_eq!(language.get(), "de");

        let host = TranslatorHost::new(Rc::clone(&language), default_dico())
            .with_loader("fr", || Ok(french_dico()));
        host.reload();
        // No French yet: the default dictionary answers.
        assert_eq!(host.translator().text("title"), "Inbox");

        // The user switches to French; the binding layer reloads.
        language.set("fr");
        host.reload();
        assert_eq!(host.translator().text("title"), "Boîte de réception");
        assert_eq!(
            host.translator().format("greeting", &["Ann", "3"]),
            "Salut Ann, tu as 3 messages"
        );
    }

    // "Restart": the persisted choice wins over the platform locale.
    let language = Rc::new(LanguageState::new(Rc::clone(&store), &FixedLocale("de-DE")));
    assert_eq!(language.get(), "fr");
}

#[test]
fn binding_layer_drives_reload_on_language_change() {
    let language = Rc::new(LanguageState::fixed("en"));
    let host = Rc::new(
        TranslatorHost::new(Rc::clone(&language), default_dico())
            .with_loader("fr", || Ok(french_dico())),
    );

    // A minimal binding layer: record language changes, reload for each.
    let changes = Rc::new(RefCell::new(Vec::new()));
    let changes_clone = Rc::clone(&changes);
    let _sub = language.subscribe(move |code: &String| changes_clone.borrow_mut().push(code.clone()));

    let titles = Rc::new(RefCell::new(Vec::new()));
    let titles_clone = Rc::clone(&titles);
    let _dico_sub = host.translation().subscribe(move |dico: &Translation| {
        titles_clone
            .borrow_mut()
            .push(dico.get("title").map(|v| v.first().to_owned()));
    });

    language.set("fr");
    let pending_changes = changes.borrow().len();
    for _ in 0..pending_changes {
        host.reload();
    }

    assert_eq!(*changes.borrow(), vec!["fr".to_owned()]);
    assert_eq!(
        *titles.borrow(),
        vec![Some("Boîte de réception".to_owned())]
    );
}

#[test]
fn multilang_extraction_follows_the_active_language() {
    let language = LanguageState::fixed("en");
    let label = MultiLang::map([("en", "Settings"), ("fr", "Paramètres")]);

    assert_eq!(language.extract(Some(&label), None), "Settings");
    language.set("fr");
    assert_eq!(language.extract(Some(&label), None), "Paramètres");
    // Unknown language: first-declared entry.
    language.set("de");
    assert_eq!(language.extract(Some(&label), None), "Settings");
}

#[test]
fn dictionaries_load_from_disk_with_variation_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fr.json");
    std::fs::write(
        &path,
        r#"{"title": "Boîte de réception", "bye": ["À plus $1", "Salut $1"]}"#,
    )
    .unwrap();

    // Regional French resolves through the base-language file.
    let language = Rc::new(LanguageState::fixed("fr-CA"));
    let host = TranslatorHost::new(Rc::clone(&language), default_dico())
        .with_loader("fr", JsonFileLoader::new(&path));

    match host.begin_reload() {
        ReloadPlan::Pending(pending) => {
            assert_eq!(pending.key(), "fr");
            let result = pending.load();
            host.finish(pending, result);
        }
        ReloadPlan::Defaulted => panic!("expected a pending load"),
    }
    assert_eq!(host.translator().text("title"), "Boîte de réception");
}

#[test]
fn unreadable_dictionary_falls_back_to_default() {
    let language = Rc::new(LanguageState::fixed("fr"));
    let host = TranslatorHost::new(Rc::clone(&language), default_dico())
        .with_loader("fr", JsonFileLoader::new("/nonexistent/fr.json"));
    host.reload();
    assert_eq!(host.translator().text("title"), "Inbox");
}
