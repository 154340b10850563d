//! Интеграционные тесты генератора: полный документ, детерминизм
//! вывода, обёртка в модуль и файловый ввод-вывод с перезаписью.

use gantry_codegen::{config, emit, Document};

const FULL_DOCUMENT: &str = r#"
parameters:
  log.prefix: app
  port: 8080
types:
  logger:
    package: myapp::logging
    type: Logger
    arguments: ["%log.prefix%"]
  pool:
    package: myapp::db
    factory: new_pool
    arguments: ["%port%", "@?logger"]
  conn:
    factory: "@pool::Acquire"
    arguments: [main]
  greet:
    func: "@engine::Greet"
  helper:
    package: myapp::util
    func: helper_fn
  log_alias:
    alias: "@logger"
  tuned:
    package: myapp::db
    type: Pool
    configurator: ["@cfg", "Apply"]
"#;

/// Каждый вид описания даёт ожидаемый регистрационный вызов.
#[test]
fn test_full_document_emission() {
    let doc = Document::from_yaml(FULL_DOCUMENT).expect("well-formed");
    let source = emit::generate(&doc, None, "register_types").expect("generates");

    assert!(source.starts_with("// @generated by gantry-gen"));
    assert!(source.contains("use gantry::{Container, Describe, Factory, Value};"));
    assert!(source.contains("pub fn register_types(container: &Container) {"));

    assert!(source.contains(r#"container.set_parameter("log.prefix", Value::from("app"));"#));
    assert!(source.contains(r#"container.set_parameter("port", Value::from(8080i64));"#));

    assert!(source.contains(
        r#"Factory::structure(myapp::logging::Logger::shape(), vec![Value::from("%log.prefix%")])"#
    ));
    assert!(source.contains(
        r#"Factory::function(myapp::db::new_pool(), vec![Value::from("%port%"), Value::from("@?logger")])"#
    ));
    assert!(source.contains(r#"Factory::proxy("@pool", "Acquire", vec![Value::from("main")])"#));
    assert!(source.contains(r#"Factory::method_ref("@engine", "Greet")"#));
    assert!(source.contains(r#"Factory::instance(Value::from(myapp::util::helper_fn()))"#));
    assert!(source.contains(r#"Factory::alias("@logger")"#));
    assert!(source.contains(
        r#"Factory::configured(Factory::structure(myapp::db::Pool::shape(), Vec::new()), "cfg", "Apply")"#
    ));
}

/// Типы и параметры выводятся в отсортированном порядке независимо от
/// порядка записей в документе.
#[test]
fn test_emission_is_sorted() {
    let doc = Document::from_yaml(
        r#"
parameters:
  zebra: 1
  alpha: 2
types:
  zeta:
    alias: "@alpha_type"
  alpha_type:
    package: myapp
    type: Alpha
"#,
    )
    .expect("well-formed");
    let source = emit::generate(&doc, None, "register_types").expect("generates");

    let alpha_param = source.find(r#"set_parameter("alpha""#).expect("alpha present");
    let zebra_param = source.find(r#"set_parameter("zebra""#).expect("zebra present");
    assert!(alpha_param < zebra_param, "parameters must be sorted");

    let alpha_type = source.find(r#""alpha_type","#).expect("alpha_type present");
    let zeta = source.find(r#""zeta","#).expect("zeta present");
    assert!(alpha_type < zeta, "types must be sorted");
}

/// Повторная генерация одного документа побайтно совпадает.
#[test]
fn test_emission_is_reproducible() {
    let doc = Document::from_yaml(FULL_DOCUMENT).expect("well-formed");
    let first = emit::generate(&doc, None, "register_types").expect("generates");
    let second = emit::generate(&doc, None, "register_types").expect("generates");
    assert_eq!(first, second);
}

/// Опция package оборачивает вывод в `pub mod` с отступом.
#[test]
fn test_package_wrapping() {
    let doc = Document::from_yaml("parameters:\n  port: 1\n").expect("well-formed");
    let source = emit::generate(&doc, Some("wiring"), "register_types").expect("generates");

    assert!(source.contains("pub mod wiring {\n"));
    assert!(source.contains("    use gantry::{Container, Value};"));
    assert!(source.contains("    pub fn register_types(container: &Container) {"));
    assert!(source.contains(r#"        container.set_parameter("port", Value::from(1i64));"#));
    assert!(source.trim_end().ends_with('}'));
}

/// Имя функции регистрации настраивается.
#[test]
fn test_custom_function_name() {
    let doc = Document::default();
    let source = emit::generate(&doc, None, "wire_everything").expect("generates");
    assert!(source.contains("pub fn wire_everything(container: &Container) {"));
}

/// Загрузка с диска, запись и семантика перезаписи.
#[test]
fn test_file_roundtrip_and_overwrite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("container.yaml");
    let output = dir.path().join("registry.rs");

    std::fs::write(&input, FULL_DOCUMENT).expect("write input");

    let doc = config::load(&input).expect("loads");
    let source = emit::generate(&doc, None, "register_types").expect("generates");

    // Первая запись создаёт файл
    assert!(emit::write_generated(&output, &source, false).expect("writes"));
    assert_eq!(std::fs::read_to_string(&output).expect("read back"), source);

    // Без overwrite существующий файл не трогается
    assert!(!emit::write_generated(&output, "other", false).expect("declines"));
    assert_eq!(std::fs::read_to_string(&output).expect("read back"), source);

    // С overwrite содержимое заменяется
    assert!(emit::write_generated(&output, "other", true).expect("replaces"));
    assert_eq!(std::fs::read_to_string(&output).expect("read back"), "other");
}

/// Отсутствующий входной файл даёт ошибку ввода-вывода с путём.
#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.yaml");
    let err = config::load(&missing).expect_err("must fail");
    assert!(err.to_string().contains("failed to read"));
    assert!(err.to_string().contains("absent.yaml"));
}

/// Дефектный документ не доходит до эмиссии.
#[test]
fn test_generate_rejects_invalid_document() {
    let doc = Document::from_yaml("types:\n  broken:\n    package: myapp\n").expect("well-formed");
    let err = emit::generate(&doc, None, "register_types").expect_err("invalid document");
    assert!(err.to_string().contains("type \"broken\""));
    assert!(err.to_string().contains("needs one of type, factory, func or alias"));
}
