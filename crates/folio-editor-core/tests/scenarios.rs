//! End-to-end behaviour of an editing session through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use folio_editor_core::{
    ActiveQuery, BlockKind, Command, Editor, EditorOptions, EditorValue, HeadingLevel, ImageFile,
    MarkType, Position, Selection, UploadStatus, UploadTicket, deserialize, serialize,
};

fn new_editor() -> Editor {
    Editor::new(EditorOptions::default()).unwrap()
}

fn changes(editor: &mut Editor) -> Rc<RefCell<Vec<EditorValue>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    editor.on_change(move |value| sink.borrow_mut().push(value.clone()));
    seen
}

fn select(editor: &mut Editor, from: Position, to: Position) {
    editor.dispatch(Command::SetSelection(Selection::new(from, to)));
}

#[test]
fn test_new_editor_serializes_to_empty_paragraph() {
    let editor = new_editor();
    let value = serialize(&editor.state().doc);
    assert_eq!(value.text, "");
    assert_eq!(value.html, "<p></p>");
}

#[test]
fn test_bold_over_typed_text() {
    let mut editor = new_editor();
    editor.dispatch(Command::InsertText("Hello".into()));
    select(&mut editor, Position::top(0, 0), Position::top(0, 5));
    assert!(editor.dispatch(Command::ToggleBold));

    assert!(editor.value().html.contains("<strong>Hello</strong>"));
    assert!(editor.is_active(ActiveQuery::Mark(MarkType::Bold)));
}

#[test]
fn test_text_file_is_rejected() {
    let mut editor = new_editor();
    editor.dispatch(Command::InsertText("body".into()));
    let blocks = editor.state().doc.block_count();

    let ticket = editor
        .select_image(ImageFile::new("notes.txt", "text/plain", &b"just text"[..]))
        .unwrap();
    let UploadTicket::Rejected { id, message } = ticket else {
        panic!("text/plain must not upload");
    };
    assert!(!message.is_empty());
    let task = editor.upload_tasks().iter().find(|t| t.id == id).unwrap();
    assert_eq!(task.status, UploadStatus::Rejected);
    assert_eq!(editor.state().doc.block_count(), blocks);
    assert_eq!(editor.state().doc.image_count(), 0);
}

#[test]
fn test_undo_twice_returns_to_heading() {
    let mut editor = new_editor();
    editor.dispatch(Command::InsertText("Hello".into()));
    select(&mut editor, Position::top(0, 0), Position::top(0, 5));

    assert!(editor.dispatch(Command::SetHeading(HeadingLevel::H1)));
    let after_heading = editor.state().doc.clone();
    assert!(editor.dispatch(Command::ToggleItalic));
    assert!(editor.dispatch(Command::InsertImage {
        src: "https://img.example/a.png".into(),
        alt: None,
    }));
    assert_eq!(editor.state().doc.image_count(), 1);

    assert!(editor.dispatch(Command::Undo));
    assert!(editor.dispatch(Command::Undo));
    assert_eq!(editor.state().doc, after_heading);
    assert_eq!(
        editor.state().doc.block_at(&[0]).map(|b| b.kind.clone()),
        Some(BlockKind::Heading(HeadingLevel::H1))
    );
}

#[test]
fn test_same_value_twice_is_stable() {
    let mut editor = new_editor();
    let seen = changes(&mut editor);
    let value = EditorValue::from_html("<p>from the owner</p>");

    assert!(editor.set_value(&value));
    select(&mut editor, Position::top(0, 4), Position::top(0, 4));
    let selection = editor.state().selection.clone();

    assert!(!editor.set_value(&value));
    assert_eq!(editor.state().selection, selection);
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_deleting_everything_leaves_one_paragraph() {
    let mut editor = new_editor();
    editor.dispatch(Command::InsertText("only paragraph".into()));
    editor.dispatch(Command::SelectAll);
    assert!(editor.dispatch(Command::DeleteBackward));

    let doc = &editor.state().doc;
    assert_eq!(doc.children().len(), 1);
    assert_eq!(doc.block_at(&[0]).map(|b| b.kind.clone()), Some(BlockKind::Paragraph));
    assert_eq!(editor.value(), EditorValue::new("<p></p>", ""));
}

#[test]
fn test_round_trip_after_editing() {
    let mut editor = new_editor();
    editor.dispatch(Command::InsertText("Title\nFirst line of text".into()));
    select(&mut editor, Position::top(0, 0), Position::top(0, 5));
    editor.dispatch(Command::SetHeading(HeadingLevel::H2));
    editor.dispatch(Command::SetTextAlign(folio_editor_core::TextAlign::Center));
    select(&mut editor, Position::top(1, 0), Position::top(1, 5));
    editor.dispatch(Command::ToggleBold);
    editor.dispatch(Command::SetLink(Some("https://example.com/?a=1&b=2".into())));
    select(&mut editor, Position::top(1, 6), Position::top(1, 10));
    editor.dispatch(Command::SetHighlight("#ff0".parse().unwrap()));
    editor.dispatch(Command::ToggleBulletList);
    editor.dispatch(Command::InsertImage {
        src: "https://img.example/b.png".into(),
        alt: Some("b".into()),
    });

    let doc = editor.state().doc.clone();
    assert_eq!(deserialize(&serialize(&doc).html), doc);
}

fn assert_round_trips(editor: &Editor) {
    let doc = editor.state().doc.clone();
    let html = serialize(&doc).html;
    assert_eq!(deserialize(&html), doc, "{html}");
}

#[test]
fn test_urls_round_trip() {
    let urls = [
        "/a b/café",
        "https://example.com/?q=\"quoted\"&x=<1>",
        "mailto:someone@example.com",
        "https://例え.jp/パス#frag",
        "javascript:alert('x')",
        "/%20already%2Fencoded",
    ];
    for url in urls {
        let mut editor = new_editor();
        editor.dispatch(Command::InsertText("here".into()));
        select(&mut editor, Position::top(0, 0), Position::top(0, 4));
        assert!(editor.dispatch(Command::SetLink(Some(url.into()))));
        select(&mut editor, Position::top(0, 4), Position::top(0, 4));
        assert!(editor.dispatch(Command::InsertImage {
            src: url.into(),
            alt: Some(url.into()),
        }));
        assert_round_trips(&editor);
    }
}

#[test]
fn test_whitespace_round_trips() {
    let samples = [
        "tab\there",
        "two  spaces",
        " leading and trailing ",
        "form\x0Cfeed",
        "lone\rreturn",
        "crlf\r\nline",
        "mixed \t\r\n\x0C end",
        "\u{a0}nbsp\u{a0}",
    ];
    for sample in samples {
        let mut editor = new_editor();
        editor.dispatch(Command::InsertText(sample.into()));
        assert_round_trips(&editor);

        let mut code = Editor::new(EditorOptions {
            value: Some(EditorValue::from_html("<pre><code></code></pre>")),
            ..Default::default()
        })
        .unwrap();
        code.dispatch(Command::InsertText(sample.into()));
        assert_round_trips(&code);
    }
}

#[test]
fn test_nested_structure_round_trips() {
    let mut editor = new_editor();
    editor.dispatch(Command::InsertText("intro\nfirst\nsecond\nquoted".into()));

    select(&mut editor, Position::top(1, 0), Position::top(2, 3));
    assert!(editor.dispatch(Command::ToggleOrderedList));
    assert_round_trips(&editor);

    select(&mut editor, Position::top(0, 0), Position::top(0, 5));
    assert!(editor.dispatch(Command::ToggleBlockquote));
    assert_round_trips(&editor);

    let last = editor.state().doc.end();
    select(&mut editor, last.clone(), last);
    assert!(editor.dispatch(Command::ToggleBlockquote));
    assert!(editor.dispatch(Command::ToggleBulletList));
    assert!(editor.dispatch(Command::ToggleItalic));
    editor.dispatch(Command::InsertText(" more".into()));
    assert!(editor.dispatch(Command::InsertImage {
        src: "https://img.example/q.png".into(),
        alt: None,
    }));
    assert_round_trips(&editor);
    assert_eq!(editor.state().doc.image_count(), 1);
}

#[test]
fn test_echo_of_every_change_is_ignored() {
    let mut editor = new_editor();
    let seen = changes(&mut editor);
    for text in ["a", "b", "c"] {
        editor.dispatch(Command::InsertText(text.into()));
        let emitted = seen.borrow().last().cloned().unwrap();
        let before = editor.state().selection.clone();
        assert!(!editor.set_value(&emitted));
        assert_eq!(editor.state().selection, before);
    }
    assert_eq!(seen.borrow().len(), 3);
}

#[test]
fn test_inserted_length_matches_text() {
    for sample in ["x", "hello world", "naïve café ☕"] {
        let mut editor = new_editor();
        editor.dispatch(Command::InsertText(sample.into()));
        let value = editor.value();
        assert_eq!(value.text.chars().count(), sample.chars().count());
        assert_eq!(editor.character_count().characters, sample.chars().count());
    }
}

#[test]
fn test_no_op_commands_leave_history_alone() {
    let mut editor = new_editor();
    let seen = changes(&mut editor);
    assert!(!editor.dispatch(Command::Undo));
    assert!(!editor.dispatch(Command::Redo));
    assert!(!editor.dispatch(Command::SetLink(None)));
    assert!(!editor.can_execute(&Command::Undo));
    assert!(seen.borrow().is_empty());
}

#[tokio::test]
async fn test_upload_while_typing() {
    let mut editor = new_editor();
    let seen = changes(&mut editor);
    editor.dispatch(Command::InsertText("start".into()));

    let first = editor
        .select_image(ImageFile::new("a.png", "image/png", &b"\x89PNG\r\n\x1a\n"[..]))
        .and_then(UploadTicket::into_pending)
        .unwrap();
    let second = editor
        .select_image(ImageFile::new("b.webp", "image/webp", &b"RIFF....WEBP"[..]))
        .and_then(UploadTicket::into_pending)
        .unwrap();
    editor.dispatch(Command::InsertText(" more".into()));
    assert_eq!(editor.value().text, "start more");

    assert!(editor.finish_upload(second.resolve().await));
    assert!(editor.finish_upload(first.resolve().await));
    assert_eq!(editor.state().doc.image_count(), 2);
    assert!(
        editor
            .upload_tasks()
            .iter()
            .all(|t| t.status == UploadStatus::Succeeded)
    );
    assert_eq!(seen.borrow().len(), 4);
}
