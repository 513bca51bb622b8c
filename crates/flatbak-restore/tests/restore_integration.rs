//! End-to-end restore tests against an in-memory SQLite install.

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use flatbak_core::{
    Driver, FlatReader, FlatWriter, FormatError, ImportMode, Record, RowSet, SqliteStore, Store,
    StoreResult, Value,
};
use flatbak_restore::{
    HookContext, ImportHook, PostUrlFormat, RestoreConfig, RestoreEngine, RestoreError,
    SessionAuth,
};

const DESTINATION: &str = "
    INSERT INTO dc_blog (blog_id, blog_uid, blog_creadt, blog_upddt, blog_url, blog_name)
    VALUES ('default', 'uid', '2024-01-01 00:00:00', '2024-01-01 00:00:00', 'http://example.com/', 'Example');
    INSERT INTO dc_user (user_id, user_pwd, user_creadt, user_upddt, user_super)
    VALUES ('admin', 'x', '2024-01-01 00:00:00', '2024-01-01 00:00:00', 1);
    INSERT INTO dc_user (user_id, user_pwd, user_creadt, user_upddt)
    VALUES ('jane', 'x', '2024-01-01 00:00:00', '2024-01-01 00:00:00');
    INSERT INTO dc_category (cat_id, blog_id, cat_title, cat_url, cat_lft, cat_rgt)
    VALUES (1, 'default', 'Misc', 'misc', 2, 3);
    INSERT INTO dc_post (post_id, blog_id, user_id, cat_id, post_dt, post_creadt, post_upddt, post_url, post_title)
    VALUES (10, 'default', 'admin', 1, '2024-01-01 00:00:00', '2024-01-01 00:00:00', '2024-01-01 00:00:00',
            '2024/01/01/10-Existing', 'Existing');
";

const CATEGORY_BLOCK: &str = "[category cat_id,blog_id,cat_title,cat_url,cat_desc,cat_position,cat_lft,cat_rgt]\n\
\"1\",\"src\",\"News\",\"news\",\"\",\"0\",\"2\",\"3\"\n";

const POST_HEADER: &str =
    "[post post_id,blog_id,user_id,cat_id,post_dt,post_creadt,post_upddt,post_url,post_title,post_content]\n";

fn post_row(id: i64, user: &str, cat: &str) -> String {
    format!(
        "\"{}\",\"src\",\"{}\",\"{}\",\"2024-03-05 10:20:30\",\"2024-03-05 10:20:30\",\
         \"2024-03-05 10:20:30\",\"2024/03/05/{}-Hello\",\"Hello\",\"Body\"\n",
        id, user, cat, id
    )
}

fn destination() -> SqliteStore {
    let store = SqliteStore::in_memory().unwrap();
    store.install_schema().unwrap();
    store.connection().execute_batch(DESTINATION).unwrap();
    store
}

fn stream(text: &str) -> FlatReader<Cursor<Vec<u8>>> {
    FlatReader::with_signature(Cursor::new(text.as_bytes().to_vec())).unwrap()
}

fn count(store: &dyn Store, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {}", store.table(table));
    store.query(&sql, &[]).unwrap().first_int().unwrap()
}

fn query(store: &dyn Store, sql: &str) -> RowSet {
    store.query(sql, &[]).unwrap()
}

#[test]
fn test_merge_remaps_category_and_post() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!(
        "///DOTCLEAR|2.0|single\n{}\n{}{}",
        CATEGORY_BLOCK,
        POST_HEADER,
        post_row(10, "admin", "1")
    );
    let summary = engine.import_single(stream(&text), "default").unwrap();
    assert_eq!(summary.mode, ImportMode::Single);
    assert_eq!(summary.inserted, 2);

    let cat = query(&store, "SELECT blog_id, cat_lft, cat_rgt FROM dc_category WHERE cat_id = 2");
    assert_eq!(cat.get(0, "blog_id"), Some(&Value::from("default")));
    assert_eq!(cat.get(0, "cat_lft"), Some(&Value::Int(4)));
    assert_eq!(cat.get(0, "cat_rgt"), Some(&Value::Int(5)));

    let post = query(&store, "SELECT cat_id, blog_id, post_url FROM dc_post WHERE post_id = 11");
    assert_eq!(post.get(0, "cat_id"), Some(&Value::Int(2)));
    assert_eq!(post.get(0, "blog_id"), Some(&Value::from("default")));
    assert_eq!(post.get(0, "post_url"), Some(&Value::from("2024/03/05/11-Hello")));

    let log = query(&store, "SELECT log_id, log_table, user_id FROM dc_log");
    assert_eq!(log.len(), 1);
    assert_eq!(log.get(0, "log_table"), Some(&Value::from("flatbak")));
}

#[test]
fn test_failing_record_rolls_everything_back() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!(
        "///DOTCLEAR|2.0|single\n{}\n{}{}\n\
         [comment comment_id,post_id,comment_dt,comment_upddt,comment_content]\n\
         \"1\",\"99\",\"2024-03-06 00:00:00\",\"2024-03-06 00:00:00\",\"Hi\"\n",
        CATEGORY_BLOCK,
        POST_HEADER,
        post_row(10, "admin", "1")
    );

    match engine.import_single(stream(&text), "default") {
        Err(RestoreError::Referential {
            relation,
            id,
            table,
            line,
        }) => {
            assert_eq!(relation, "post");
            assert_eq!(id, 99);
            assert_eq!(table, "comment");
            assert_eq!(line, 9);
        }
        other => panic!("expected referential error, got {:?}", other),
    }

    assert_eq!(count(&store, "category"), 1);
    assert_eq!(count(&store, "post"), 1);
    assert_eq!(count(&store, "comment"), 0);
    assert_eq!(count(&store, "log"), 0);
}

#[test]
fn test_post_with_unmapped_category() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!("///DOTCLEAR|2.0|single\n{}{}", POST_HEADER, post_row(10, "admin", "5"));
    let err = engine.import_single(stream(&text), "default").unwrap_err();
    assert!(matches!(
        err.root(),
        RestoreError::Referential {
            relation: "category",
            id: 5,
            ..
        }
    ));
    assert_eq!(err.line(), Some(3));
    assert_eq!(count(&store, "post"), 1);
}

#[test]
fn test_post_without_category() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!("///DOTCLEAR|2.0|single\n{}{}", POST_HEADER, post_row(3, "admin", "0"));
    engine.import_single(stream(&text), "default").unwrap();

    let post = query(&store, "SELECT cat_id FROM dc_post WHERE post_id = 11");
    assert_eq!(post.get(0, "cat_id"), Some(&Value::Null));
}

#[test]
fn test_category_reused_by_url() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!(
        "///DOTCLEAR|2.0|single\n\
         [category cat_id,blog_id,cat_title,cat_url]\n\"7\",\"src\",\"Other\",\"misc\"\n\
         {}{}",
        POST_HEADER,
        post_row(4, "admin", "7")
    );
    let summary = engine.import_single(stream(&text), "default").unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.inserted, 1);

    assert_eq!(count(&store, "category"), 1);
    let post = query(&store, "SELECT cat_id FROM dc_post WHERE post_id = 11");
    assert_eq!(post.get(0, "cat_id"), Some(&Value::Int(1)));
}

#[test]
fn test_duplicate_post_url_gets_suffix() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::new("{t}");
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!(
        "///DOTCLEAR|2.0|single\n{}{}{}",
        POST_HEADER,
        post_row(1, "admin", ""),
        post_row(2, "admin", "")
    );
    engine.import_single(stream(&text), "default").unwrap();

    let rs = query(&store, "SELECT post_url FROM dc_post WHERE post_id > 10 ORDER BY post_id");
    assert_eq!(rs.get(0, "post_url"), Some(&Value::from("Hello")));
    assert_eq!(rs.get(1, "post_url"), Some(&Value::from("Hello-1")));
}

#[test]
fn test_suffixed_post_url_stays_within_limit() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::new("{t}");
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let title = "x".repeat(300);
    let row = |id: i64| {
        format!(
            "\"{}\",\"src\",\"admin\",\"\",\"2024-03-05 10:20:30\",\"2024-03-05 10:20:30\",\
             \"2024-03-05 10:20:30\",\"\",\"{}\",\"Body\"\n",
            id, title
        )
    };
    let text = format!("///DOTCLEAR|2.0|single\n{}{}{}", POST_HEADER, row(1), row(2));
    engine.import_single(stream(&text), "default").unwrap();

    let rs = query(&store, "SELECT post_url FROM dc_post WHERE post_id > 10 ORDER BY post_id");
    let first = rs.get(0, "post_url").and_then(Value::as_str).unwrap();
    let second = rs.get(1, "post_url").and_then(Value::as_str).unwrap();
    assert_eq!(first.chars().count(), 255);
    assert_eq!(second.chars().count(), 255);
    assert!(second.ends_with("x-1"));
    assert_ne!(first, second);
}

#[test]
fn test_media_deduplicated_by_path_and_file() {
    let store = destination();
    store
        .connection()
        .execute_batch(
            "INSERT INTO dc_media (media_id, user_id, media_path, media_title, media_file,
                                   media_dt, media_creadt, media_upddt)
             VALUES (1, 'admin', 'default', 'A', 'a.jpg', '2024-01-01 00:00:00',
                     '2024-01-01 00:00:00', '2024-01-01 00:00:00');",
        )
        .unwrap();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!(
        "///DOTCLEAR|2.0|single\n\
         [media media_id,user_id,media_path,media_title,media_file,media_dt,media_creadt,media_upddt]\n\
         \"4\",\"admin\",\"default\",\"A\",\"a.jpg\",\"2024-01-01 00:00:00\",\"2024-01-01 00:00:00\",\"2024-01-01 00:00:00\"\n\
         \"5\",\"admin\",\"default\",\"B\",\"b.jpg\",\"2024-01-01 00:00:00\",\"2024-01-01 00:00:00\",\"2024-01-01 00:00:00\"\n\n\
         {}{}\n\
         [post_media media_id,post_id]\n\"4\",\"10\"\n\"5\",\"10\"\n",
        POST_HEADER,
        post_row(10, "admin", "")
    );
    let summary = engine.import_single(stream(&text), "default").unwrap();
    assert_eq!(summary.skipped, 1);

    assert_eq!(count(&store, "media"), 2);
    let links = query(
        &store,
        "SELECT media_id, post_id FROM dc_post_media ORDER BY media_id",
    );
    assert_eq!(links.len(), 2);
    assert_eq!(links.get(0, "media_id"), Some(&Value::Int(1)));
    assert_eq!(links.get(0, "post_id"), Some(&Value::Int(11)));
    assert_eq!(links.get(1, "media_id"), Some(&Value::Int(2)));
}

#[test]
fn test_unknown_user_becomes_placeholder_for_super_admin() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!(
        "///DOTCLEAR|2.0|single\n{}{}{}",
        POST_HEADER,
        post_row(1, "jé rôme", ""),
        post_row(2, "jé rôme", "")
    );
    engine.import_single(stream(&text), "default").unwrap();

    assert_eq!(count(&store, "user"), 3);
    let rs = query(&store, "SELECT DISTINCT user_id FROM dc_post WHERE post_id > 10");
    assert_eq!(rs.len(), 1);
    assert_eq!(rs.get(0, "user_id"), Some(&Value::from("jrme")));
}

#[test]
fn test_unknown_user_falls_back_to_caller() {
    let store = destination();
    let auth = SessionAuth::new("jane").with_blog_admin("default");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!("///DOTCLEAR|2.0|single\n{}{}", POST_HEADER, post_row(1, "ghost", ""));
    engine.import_single(stream(&text), "default").unwrap();

    assert_eq!(count(&store, "user"), 2);
    let rs = query(&store, "SELECT user_id FROM dc_post WHERE post_id = 11");
    assert_eq!(rs.get(0, "user_id"), Some(&Value::from("jane")));
}

#[test]
fn test_full_restore_requires_super_admin() {
    let store = destination();
    let auth = SessionAuth::new("jane").with_blog_admin("default");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = "///DOTCLEAR|2.0|full\n[setting setting_id,setting_value]\n\"a\",\"b\"\n";
    assert!(matches!(
        engine.import_full(stream(text)),
        Err(RestoreError::Permission(_))
    ));
    assert_eq!(count(&store, "blog"), 1);
    assert_eq!(count(&store, "post"), 1);
    assert_eq!(count(&store, "setting"), 0);
}

#[test]
fn test_full_restore_requires_signature() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let reader = FlatReader::new(Cursor::new(
        b"[spamrule rule_id,rule_type,rule_content]\n\"1\",\"word\",\"x\"\n".to_vec(),
    ));
    let err = engine.import_full(reader).unwrap_err();
    assert!(matches!(
        err,
        RestoreError::Format(FormatError::InvalidSignature(_))
    ));
    assert_eq!(count(&store, "blog"), 1);
    assert_eq!(count(&store, "post"), 1);
    assert_eq!(count(&store, "spamrule"), 0);
}

#[test]
fn test_merge_requires_blog_admin() {
    let store = destination();
    let auth = SessionAuth::new("jane").with_blog_admin("other");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!("///DOTCLEAR|2.0|single\n{}", CATEGORY_BLOCK);
    assert!(matches!(
        engine.import_single(stream(&text), "default"),
        Err(RestoreError::Permission(_))
    ));
    assert_eq!(count(&store, "category"), 1);
}

#[test]
fn test_full_restore_round_trip() {
    let source = destination();
    source
        .connection()
        .execute_batch(
            "INSERT INTO dc_comment (comment_id, post_id, comment_dt, comment_upddt, comment_content)
             VALUES (1, 10, '2024-01-02 00:00:00', '2024-01-02 00:00:00', 'first \"line\"
second line');",
        )
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("full.txt");
    let mut writer = FlatWriter::create(&path).unwrap();
    writer.write_signature("2.0", ImportMode::Full).unwrap();
    writer.export_all(&source).unwrap();
    writer.finish().unwrap();

    let target = SqliteStore::in_memory().unwrap();
    target.install_schema().unwrap();
    target
        .connection()
        .execute_batch(
            "INSERT INTO dc_user (user_id, user_pwd, user_creadt, user_upddt, user_super)
             VALUES ('admin', 'kept', '2023-01-01 00:00:00', '2023-01-01 00:00:00', 1);",
        )
        .unwrap();

    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&target, &auth, &urls, RestoreConfig::default());
    let summary = engine.restore(FlatReader::open(&path).unwrap(), "ignored").unwrap();

    assert_eq!(summary.mode, ImportMode::Full);
    assert_eq!(summary.skipped, 1);
    for table in ["blog", "category", "post", "comment", "user"] {
        assert_eq!(count(&target, table), count(&source, table), "{}", table);
    }

    let user = query(&target, "SELECT user_pwd FROM dc_user WHERE user_id = 'admin'");
    assert_eq!(user.get(0, "user_pwd"), Some(&Value::from("kept")));
    let comment = query(&target, "SELECT comment_content FROM dc_comment");
    assert_eq!(
        comment.get(0, "comment_content"),
        Some(&Value::from("first \"line\"\nsecond line"))
    );
}

#[test]
fn test_full_restore_replaces_blogs() {
    let store = destination();
    store
        .connection()
        .execute_batch(
            "INSERT INTO dc_spamrule (rule_id, rule_content) VALUES (1, 'old');
             INSERT INTO dc_setting (setting_id, setting_value) VALUES ('stale', 'x');",
        )
        .unwrap();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = "///DOTCLEAR|2.0|full\n\
                [blog blog_id,blog_uid,blog_creadt,blog_upddt,blog_url,blog_name]\n\
                \"main\",\"u\",\"2024-01-01 00:00:00\",\"2024-01-01 00:00:00\",\"http://m/\",\"Main\"\n\n\
                [spamrule rule_id,rule_type,rule_content]\n\"1\",\"word\",\"new\"\n\"2\",\"ip\",\"10.0.0.1\"\n\n\
                [mystery a,b]\n\"1\",\"2\"\n";
    let summary = engine.import_full(stream(text)).unwrap();
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.ignored, 1);

    let blogs = query(&store, "SELECT blog_id FROM dc_blog");
    assert_eq!(blogs.len(), 1);
    assert_eq!(blogs.get(0, "blog_id"), Some(&Value::from("main")));
    assert_eq!(count(&store, "post"), 0);
    assert_eq!(count(&store, "setting"), 0);
    assert_eq!(count(&store, "user"), 2);

    let rule = query(&store, "SELECT rule_content FROM dc_spamrule WHERE rule_id = 1");
    assert_eq!(rule.get(0, "rule_content"), Some(&Value::from("new")));
}

#[test]
fn test_full_restore_error_keeps_previous_content() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = "///DOTCLEAR|2.0|full\n\
                [blog blog_id,blog_uid,blog_creadt,blog_upddt,blog_url,blog_name]\n\
                \"main\",\"u\",\"2024-01-01 00:00:00\",\"2024-01-01 00:00:00\",\"http://m/\",\"Main\"\n\
                \"broken\",\"u\"\n";
    let err = engine.import_full(stream(text)).unwrap_err();
    assert!(matches!(err, RestoreError::Format(_)));
    assert_eq!(err.line(), Some(4));

    let blogs = query(&store, "SELECT blog_id FROM dc_blog");
    assert_eq!(blogs.get(0, "blog_id"), Some(&Value::from("default")));
    assert_eq!(count(&store, "post"), 1);
}

#[test]
fn test_undecodable_line_reports_its_number() {
    let store = destination();
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let mut bytes = format!(
        "///DOTCLEAR|2.0|single\n{}{}\"2\",\"",
        POST_HEADER,
        post_row(1, "admin", "")
    )
    .into_bytes();
    bytes.extend_from_slice(&[0xFF, 0xFE]);
    bytes.extend_from_slice(b"\"\n");
    let reader = FlatReader::with_signature(Cursor::new(bytes)).unwrap();

    let err = engine.import_single(reader, "default").unwrap_err();
    assert_eq!(err.line(), Some(4));
    assert!(matches!(err.root(), RestoreError::Io(_)));
    assert_eq!(count(&store, "post"), 1);
    assert_eq!(count(&store, "log"), 0);
}

#[test]
fn test_deferral_allows_children_before_parents() {
    let text = "///DOTCLEAR|2.0|full\n\
                [blog blog_id,blog_uid,blog_creadt,blog_upddt,blog_url,blog_name]\n\
                \"main\",\"u\",\"2024-01-01 00:00:00\",\"2024-01-01 00:00:00\",\"http://m/\",\"Main\"\n\n\
                [comment comment_id,post_id,comment_dt,comment_upddt]\n\
                \"1\",\"5\",\"2024-01-01 00:00:00\",\"2024-01-01 00:00:00\"\n\n\
                [post post_id,blog_id,user_id,post_dt,post_creadt,post_upddt,post_url]\n\
                \"5\",\"main\",\"admin\",\"2024-01-01 00:00:00\",\"2024-01-01 00:00:00\",\"2024-01-01 00:00:00\",\"p\"\n";
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();

    let store = destination();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());
    engine.import_full(stream(text)).unwrap();
    assert_eq!(count(&store, "comment"), 1);

    let store = destination();
    let strict = RestoreConfig::default().without_constraint_deferral();
    let engine = RestoreEngine::new(&store, &auth, &urls, strict);
    let err = engine.import_full(stream(text)).unwrap_err();
    assert!(matches!(err.root(), RestoreError::Storage(_)));
    assert_eq!(err.line(), Some(6));
    assert_eq!(count(&store, "post"), 1);
}

/// Store recording the pragmas it runs.
struct RecordingStore {
    inner: SqliteStore,
    pragmas: RefCell<Vec<String>>,
}

impl Store for RecordingStore {
    fn driver(&self) -> Driver {
        self.inner.driver()
    }

    fn prefix(&self) -> &str {
        self.inner.prefix()
    }

    fn query(&self, sql: &str, params: &[Value]) -> StoreResult<RowSet> {
        self.inner.query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        if sql.starts_with("PRAGMA") {
            self.pragmas.borrow_mut().push(sql.to_string());
        }
        self.inner.execute(sql, params)
    }

    fn begin(&self) -> StoreResult<()> {
        self.inner.begin()
    }

    fn commit(&self) -> StoreResult<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> StoreResult<()> {
        self.inner.rollback()
    }

    fn tables(&self) -> StoreResult<Vec<String>> {
        self.inner.tables()
    }
}

#[test]
fn test_constraint_toggle_sequence() {
    let store = RecordingStore {
        inner: destination(),
        pragmas: RefCell::new(Vec::new()),
    };
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default());

    let text = format!(
        "///DOTCLEAR|2.0|single\n{}\n{}{}\n\
         [link link_id,link_href,link_title]\n\"1\",\"http://x/\",\"X\"\n\n\
         {}{}",
        CATEGORY_BLOCK,
        POST_HEADER,
        post_row(1, "admin", "1"),
        POST_HEADER,
        post_row(2, "admin", "1")
    );
    engine.import_single(stream(&text), "default").unwrap();

    assert_eq!(
        *store.pragmas.borrow(),
        vec![
            "PRAGMA defer_foreign_keys = ON",
            "PRAGMA defer_foreign_keys = OFF",
            "PRAGMA defer_foreign_keys = ON",
            "PRAGMA defer_foreign_keys = OFF",
        ]
    );
    assert_eq!(count(&store, "link"), 1);
}

/// Hook appending its name and the event to a shared journal.
struct Journal {
    name: &'static str,
    events: Rc<RefCell<Vec<String>>>,
}

impl Journal {
    fn push(&self, event: String) {
        self.events.borrow_mut().push(format!("{}:{}", self.name, event));
    }
}

impl ImportHook for Journal {
    fn import_start(&self, ctx: &HookContext<'_>) {
        self.push(format!("start {}", ctx.mode));
    }

    fn adapt_legacy(&self, _ctx: &HookContext<'_>, record: &mut Record) {
        if record.table() == "category" {
            record.set("cat_desc", "adapted");
        }
        self.push(format!("legacy {}", record.table()));
    }

    fn record(&self, _ctx: &HookContext<'_>, record: &Record) {
        self.push(format!("record {}", record.table()));
    }

    fn pre_commit(&self, ctx: &HookContext<'_>) {
        let posts = ctx
            .store
            .query(&format!("SELECT COUNT(*) FROM {}", ctx.store.table("post")), &[])
            .unwrap()
            .first_int()
            .unwrap();
        self.push(format!("pre_commit {}", posts));
    }
}

#[test]
fn test_hooks_run_in_order() {
    let store = destination();
    let events = Rc::new(RefCell::new(Vec::new()));
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default())
        .with_hook(Journal {
            name: "a",
            events: Rc::clone(&events),
        })
        .with_hook(Journal {
            name: "b",
            events: Rc::clone(&events),
        });

    let text = format!(
        "///DOTCLEAR|2.0|single\n{}\n{}{}",
        CATEGORY_BLOCK,
        POST_HEADER,
        post_row(10, "admin", "1")
    );
    engine.import_single(stream(&text), "default").unwrap();

    assert_eq!(
        *events.borrow(),
        vec![
            "a:start single",
            "b:start single",
            "a:record category",
            "b:record category",
            "a:record post",
            "b:record post",
            "a:pre_commit 2",
            "b:pre_commit 2",
        ]
    );
}

#[test]
fn test_legacy_merge() {
    let store = destination();
    let events = Rc::new(RefCell::new(Vec::new()));
    let auth = SessionAuth::super_admin("admin");
    let urls = PostUrlFormat::default();
    let engine = RestoreEngine::new(&store, &auth, &urls, RestoreConfig::default()).with_hook(
        Journal {
            name: "h",
            events: Rc::clone(&events),
        },
    );

    let text = "///DOTCLEAR|1.2.5\n\
        [categorie cat_id,cat_libelle,cat_desc,cat_libelle_url,cat_ord]\n\
        \"3\",\"Actualit&eacute;\",\"\",\"actu\",\"1\"\n\n\
        [post post_id,user_id,cat_id,post_dt,post_creadt,post_upddt,post_titre,post_titre_url,post_chapo,post_chapo_wiki,post_content,post_content_wiki,post_pub,post_open_comment,post_open_tb]\n\
        \"7\",\"admin\",\"3\",\"2004-05-06 07:08:09\",\"2004-05-06 07:08:09\",\"2004-05-06 07:08:09\",\"R&amp;D\",\"r-d\",\"<p>chapo</p>\",\"chapo\",\"<p>body</p>\",\"body\",\"1\",\"1\",\"0\"\n\
        \"8\",\"admin\",\"3\",\"2004-05-07 07:08:09\",\"2004-05-07 07:08:09\",\"2004-05-07 07:08:09\",\"Plain\",\"plain\",\"\",\"\",\"<p>plain</p>\",\"\",\"0\",\"0\",\"0\"\n";
    let summary = engine.import_single(stream(text), "default").unwrap();
    assert_eq!(summary.legacy, 3);
    assert_eq!(summary.inserted, 3);

    let cat = query(&store, "SELECT cat_id, cat_title, cat_desc FROM dc_category WHERE cat_url = 'actu'");
    assert_eq!(cat.get(0, "cat_id"), Some(&Value::Int(2)));
    assert_eq!(cat.get(0, "cat_desc"), Some(&Value::from("adapted")));

    let posts = query(
        &store,
        "SELECT post_title, post_format, post_content, post_content_xhtml, post_excerpt,
                post_status, post_open_comment, cat_id
         FROM dc_post WHERE post_id > 10 ORDER BY post_id",
    );
    assert_eq!(posts.len(), 2);
    assert_eq!(posts.get(0, "post_title"), Some(&Value::from("R&D")));
    assert_eq!(posts.get(0, "post_format"), Some(&Value::from("wiki")));
    assert_eq!(posts.get(0, "post_content"), Some(&Value::from("body")));
    assert_eq!(posts.get(0, "post_content_xhtml"), Some(&Value::from("<p>body</p>")));
    assert_eq!(posts.get(0, "post_excerpt"), Some(&Value::from("chapo")));
    assert_eq!(posts.get(0, "post_status"), Some(&Value::Int(1)));
    assert_eq!(posts.get(0, "post_open_comment"), Some(&Value::Int(1)));
    assert_eq!(posts.get(0, "cat_id"), Some(&Value::Int(2)));

    assert_eq!(posts.get(1, "post_format"), Some(&Value::from("xhtml")));
    assert_eq!(posts.get(1, "post_content"), Some(&Value::from("<p>plain</p>")));
    assert_eq!(posts.get(1, "post_status"), Some(&Value::Int(0)));

    let events = events.borrow();
    assert_eq!(events[0], "h:start single");
    assert_eq!(events[1], "h:legacy category");
    assert_eq!(events[2], "h:record category");
    assert_eq!(events.last().map(String::as_str), Some("h:pre_commit 3"));
}
