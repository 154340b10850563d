//! Модель конфигурационного документа.
//!
//! Документ состоит из двух секций: `parameters` (плоская карта имя ->
//! литерал) и `types` (карта type-ID -> описание типа). Описание несёт
//! цель регистрации ровно одного вида: `type` (композитная форма),
//! `factory` (фабричная функция или `@id::Method`-прокси), `func`
//! (значение-функция или `@id::Method`-ссылка) либо `alias`. Все
//! проверки выполняются до генерации, чтобы эмиттер не мог выдать
//! некомпилируемый код.

use std::collections::BTreeMap;
use std::path::Path;

use gantry::reference::{is_invokable_method, is_type_reference};
use gantry::TypeRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Ошибки загрузки и проверки документа.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("parameter {name:?}: {message}")]
    BadParameter { name: String, message: String },

    #[error("type {type_id:?}: {message}")]
    BadDefinition { type_id: String, message: String },

    #[error("{what} {name:?} is not a valid Rust identifier")]
    BadIdentifier { what: &'static str, name: String },
}

impl ConfigError {
    pub fn bad_parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::BadParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn bad_definition(type_id: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::BadDefinition {
            type_id: type_id.into(),
            message: message.into(),
        }
    }
}

/// Разобранный документ. Карты упорядочены по ключу, поэтому генерация
/// детерминирована независимо от порядка записей в YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDef>,
}

/// Описание одного типа из секции `types`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDef {
    /// Rust-путь модуля, в котором определены форма или функция.
    #[serde(default)]
    pub package: Option<String>,
    /// Имя композитной формы; регистрируется через `<package>::<type>::shape()`.
    #[serde(default, rename = "type")]
    pub composite: Option<String>,
    /// Имя фабричной функции либо `@id::Method` для прокси.
    #[serde(default)]
    pub factory: Option<String>,
    /// Имя функции-значения либо `@id::Method` для ссылки на метод.
    #[serde(default, rename = "func")]
    pub function: Option<String>,
    /// Цель псевдонима, например `@logger` или `@engine::Greet`.
    #[serde(default)]
    pub alias: Option<String>,
    /// Пара `["@id", "Method"]`, донастраивающая значение после постройки.
    #[serde(default)]
    pub configurator: Option<Vec<String>>,
    /// Аргументы фабрики: литералы, `%param%` и `@id`-ссылки.
    #[serde(default)]
    pub arguments: Vec<serde_yaml::Value>,
}

/// Классифицированная цель регистрации, готовая к эмиссии.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    Composite { package: String, name: String },
    FactoryFn { package: String, name: String },
    Proxy { target: String, method: String },
    MethodRef { target: String, method: String },
    FunctionValue { package: String, name: String },
    Alias { target: String },
}

/// Читает и разбирает документ с диска. Проверка правил выполняется
/// отдельно, в [`Document::validate`].
pub fn load(path: &Path) -> Result<Document, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

impl Document {
    /// Разбирает документ из строки YAML.
    pub fn from_yaml(text: &str) -> Result<Document, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Проверяет все правила документа, первая нарушенная даёт ошибку.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in &self.parameters {
            if name.is_empty() {
                return Err(ConfigError::bad_parameter(name, "name must not be empty"));
            }
            if name.contains('%') {
                return Err(ConfigError::bad_parameter(name, "name must not contain '%'"));
            }
            check_literal(value).map_err(|message| ConfigError::bad_parameter(name, message))?;
        }
        for (id, def) in &self.types {
            validate_type_id(id)?;
            def.validate(id)?;
        }
        debug!(
            parameters = self.parameters.len(),
            types = self.types.len(),
            "configuration document validated"
        );
        Ok(())
    }
}

impl TypeDef {
    /// Классифицирует цель описания, проверяя взаимоисключение ключей.
    pub fn target(&self, id: &str) -> Result<TargetKind, ConfigError> {
        let mut present = Vec::new();
        if self.composite.is_some() {
            present.push("type");
        }
        if self.factory.is_some() {
            present.push("factory");
        }
        if self.function.is_some() {
            present.push("func");
        }
        if self.alias.is_some() {
            present.push("alias");
        }
        match present.as_slice() {
            [] => {
                return Err(ConfigError::bad_definition(
                    id,
                    "needs one of type, factory, func or alias",
                ))
            }
            ["factory", "func"] => {
                return Err(ConfigError::bad_definition(
                    id,
                    "factory and func are mutually exclusive",
                ))
            }
            [_] => {}
            keys => {
                return Err(ConfigError::bad_definition(
                    id,
                    format!("{} are mutually exclusive", keys.join(" and ")),
                ))
            }
        }

        if let Some(name) = &self.composite {
            let package = self.required_package(id)?;
            ensure_ident(id, "type", name)?;
            return Ok(TargetKind::Composite {
                package,
                name: name.clone(),
            });
        }
        if let Some(factory) = &self.factory {
            if is_type_reference(factory) {
                let (target, method) = method_target(id, "factory", factory)?;
                return Ok(TargetKind::Proxy { target, method });
            }
            let package = self.required_package(id)?;
            ensure_ident(id, "factory", factory)?;
            return Ok(TargetKind::FactoryFn {
                package,
                name: factory.clone(),
            });
        }
        if let Some(function) = &self.function {
            if is_type_reference(function) {
                let (target, method) = method_target(id, "func", function)?;
                return Ok(TargetKind::MethodRef { target, method });
            }
            let package = self.required_package(id)?;
            ensure_ident(id, "func", function)?;
            return Ok(TargetKind::FunctionValue {
                package,
                name: function.clone(),
            });
        }

        // Здесь может остаться только alias
        let alias = self.alias.as_deref().unwrap_or_default();
        TypeRef::parse(alias).map_err(|err| ConfigError::bad_definition(id, err.to_string()))?;
        Ok(TargetKind::Alias {
            target: alias.to_string(),
        })
    }

    /// Разобранная пара конфигуратора `(type-ID, метод)`, если задана.
    pub fn configurator_pair(&self, id: &str) -> Result<Option<(String, String)>, ConfigError> {
        match &self.configurator {
            Some(pair) => check_configurator(id, pair).map(Some),
            None => Ok(None),
        }
    }

    /// Проверяет описание целиком: цель, аргументы, конфигуратор.
    pub fn validate(&self, id: &str) -> Result<(), ConfigError> {
        let target = self.target(id)?;
        match target {
            TargetKind::MethodRef { .. } | TargetKind::FunctionValue { .. } => {
                if !self.arguments.is_empty() {
                    return Err(ConfigError::bad_definition(
                        id,
                        "a func registration must not carry arguments",
                    ));
                }
            }
            TargetKind::Alias { .. } => {
                if self.package.is_some() || !self.arguments.is_empty() {
                    return Err(ConfigError::bad_definition(
                        id,
                        "an alias must not carry package or arguments",
                    ));
                }
            }
            _ => {}
        }
        for (index, argument) in self.arguments.iter().enumerate() {
            check_argument(id, index, argument)?;
        }
        self.configurator_pair(id)?;
        Ok(())
    }

    fn required_package(&self, id: &str) -> Result<String, ConfigError> {
        let Some(package) = &self.package else {
            return Err(ConfigError::bad_definition(
                id,
                "a package is required unless the target is an alias or an embedded @reference",
            ));
        };
        if !is_rust_path(package) {
            return Err(ConfigError::bad_definition(
                id,
                format!("package {package:?} is not a valid Rust path"),
            ));
        }
        Ok(package.clone())
    }
}

/// Имя является простым Rust-идентификатором.
pub fn is_rust_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Строка является Rust-путём из идентификаторов через `::`.
pub fn is_rust_path(s: &str) -> bool {
    !s.is_empty() && s.split("::").all(is_rust_ident)
}

fn ensure_ident(id: &str, field: &str, name: &str) -> Result<(), ConfigError> {
    if is_rust_ident(name) {
        Ok(())
    } else {
        Err(ConfigError::bad_definition(
            id,
            format!("{field} {name:?} is not a valid Rust identifier"),
        ))
    }
}

fn validate_type_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::bad_definition(id, "type ID must not be empty"));
    }
    if id.starts_with('@') || id.starts_with('%') || id.contains("::") {
        return Err(ConfigError::bad_definition(
            id,
            "type ID must not start with '@' or '%' or contain '::'",
        ));
    }
    Ok(())
}

/// Цель вида `@id::Method` для фабрики-прокси или ссылки на метод.
/// Возвращает нормализованную цель без селектора и сам метод.
fn method_target(id: &str, field: &str, raw: &str) -> Result<(String, String), ConfigError> {
    let reference =
        TypeRef::parse(raw).map_err(|err| ConfigError::bad_definition(id, err.to_string()))?;
    let Some(method) = reference.method() else {
        return Err(ConfigError::bad_definition(
            id,
            format!("{field} reference {raw:?} must carry a ::Method selector"),
        ));
    };
    if !is_invokable_method(method) {
        return Err(ConfigError::bad_definition(
            id,
            format!("method {method:?} is not invokable, the name must start with an uppercase letter"),
        ));
    }
    let target = if reference.is_optional() {
        format!("@?{}", reference.id())
    } else {
        format!("@{}", reference.id())
    };
    Ok((target, method.to_string()))
}

fn check_configurator(id: &str, pair: &[String]) -> Result<(String, String), ConfigError> {
    let [target, method] = pair else {
        return Err(ConfigError::bad_definition(
            id,
            format!("a configurator needs exactly two entries, got {}", pair.len()),
        ));
    };
    if !target.starts_with('@') {
        return Err(ConfigError::bad_definition(
            id,
            format!("configurator target {target:?} must begin with '@'"),
        ));
    }
    let reference =
        TypeRef::parse(target).map_err(|err| ConfigError::bad_definition(id, err.to_string()))?;
    if reference.method().is_some() || reference.is_optional() {
        return Err(ConfigError::bad_definition(
            id,
            format!("configurator target {target:?} must be a plain @id reference"),
        ));
    }
    if !is_invokable_method(method) {
        return Err(ConfigError::bad_definition(
            id,
            format!("configurator method {method:?} must start with an uppercase letter"),
        ));
    }
    Ok((reference.id().to_string(), method.clone()))
}

fn check_argument(id: &str, index: usize, value: &serde_yaml::Value) -> Result<(), ConfigError> {
    if let serde_yaml::Value::String(s) = value {
        if is_type_reference(s) {
            let reference = TypeRef::parse(s).map_err(|err| {
                ConfigError::bad_definition(id, format!("argument {index}: {err}"))
            })?;
            if let Some(method) = reference.method() {
                if !is_invokable_method(method) {
                    return Err(ConfigError::bad_definition(
                        id,
                        format!(
                            "argument {index}: method {method:?} must start with an uppercase letter"
                        ),
                    ));
                }
            }
        }
        return Ok(());
    }
    check_literal(value)
        .map_err(|message| ConfigError::bad_definition(id, format!("argument {index}: {message}")))
}

/// Литерал представим как [`gantry::Value`]: скаляры, списки и карты
/// со строковыми ключами. Тегированные значения YAML не поддерживаются.
fn check_literal(value: &serde_yaml::Value) -> Result<(), String> {
    match value {
        serde_yaml::Value::Tagged(_) => Err("tagged YAML values are not supported".to_string()),
        serde_yaml::Value::Number(n) if n.is_u64() && n.as_i64().is_none() => {
            Err("integer literal out of range".to_string())
        }
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                check_literal(item)?;
            }
            Ok(())
        }
        serde_yaml::Value::Mapping(entries) => {
            for (key, item) in entries {
                if !key.is_string() {
                    return Err("mapping keys must be strings".to_string());
                }
                check_literal(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Document {
        Document::from_yaml(yaml).expect("well-formed yaml")
    }

    #[test]
    fn test_valid_document_passes() {
        let document = doc(r#"
parameters:
  log.prefix: app
types:
  logger:
    package: myapp::logging
    type: Logger
    arguments: ["%log.prefix%"]
  pool:
    package: myapp::db
    factory: new_pool
  conn:
    factory: "@pool::Acquire"
  greet:
    func: "@engine::Greet"
  log_alias:
    alias: "@logger"
"#);
        document.validate().expect("document is sound");
    }

    #[test]
    fn test_target_classification() {
        let document = doc(r#"
types:
  conn:
    factory: "@?pool::Acquire"
"#);
        let def = &document.types["conn"];
        assert_eq!(
            def.target("conn").expect("classifies"),
            TargetKind::Proxy {
                target: "@?pool".to_string(),
                method: "Acquire".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_definition_without_target() {
        let document = doc("types:\n  ghost:\n    package: myapp\n");
        let err = document.validate().expect_err("no target");
        assert!(err.to_string().contains("needs one of type, factory, func or alias"));
    }

    #[test]
    fn test_rejects_factory_and_func_together() {
        let document = doc(r#"
types:
  both:
    package: myapp
    factory: make
    func: take
"#);
        let err = document.validate().expect_err("exclusive");
        assert!(err.to_string().contains("factory and func are mutually exclusive"));
    }

    #[test]
    fn test_rejects_type_and_alias_together() {
        let document = doc(r#"
types:
  both:
    package: myapp
    type: Logger
    alias: "@logger"
"#);
        let err = document.validate().expect_err("exclusive");
        assert!(err.to_string().contains("type and alias are mutually exclusive"));
    }

    #[test]
    fn test_rejects_func_with_arguments() {
        let document = doc(r#"
types:
  greet:
    func: "@engine::Greet"
    arguments: [1]
"#);
        let err = document.validate().expect_err("func carries arguments");
        assert!(err.to_string().contains("must not carry arguments"));
    }

    #[test]
    fn test_rejects_alias_with_package() {
        let document = doc(r#"
types:
  log_alias:
    package: myapp
    alias: "@logger"
"#);
        let err = document.validate().expect_err("alias carries package");
        assert!(err.to_string().contains("must not carry package or arguments"));
    }

    #[test]
    fn test_rejects_composite_without_package() {
        let document = doc("types:\n  logger:\n    type: Logger\n");
        let err = document.validate().expect_err("package missing");
        assert!(err.to_string().contains("a package is required"));
    }

    #[test]
    fn test_rejects_factory_reference_without_method() {
        let document = doc("types:\n  conn:\n    factory: \"@pool\"\n");
        let err = document.validate().expect_err("no selector");
        assert!(err.to_string().contains("must carry a ::Method selector"));
    }

    #[test]
    fn test_rejects_lowercase_method() {
        let document = doc("types:\n  conn:\n    factory: \"@pool::acquire\"\n");
        let err = document.validate().expect_err("lowercase method");
        assert!(err.to_string().contains("uppercase"));
    }

    #[test]
    fn test_configurator_rules() {
        let cases = [
            ("configurator: [\"@cfg\"]", "exactly two entries"),
            ("configurator: [\"cfg\", \"Apply\"]", "must begin with '@'"),
            ("configurator: [\"@cfg::Touch\", \"Apply\"]", "plain @id reference"),
            ("configurator: [\"@cfg\", \"apply\"]", "uppercase"),
        ];
        for (line, expected) in cases {
            let yaml = format!(
                "types:\n  doc:\n    package: myapp\n    type: Doc\n    {line}\n"
            );
            let err = doc(&yaml).validate().expect_err("configurator defect");
            assert!(
                err.to_string().contains(expected),
                "case {line:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_argument_reference() {
        let document = doc(r#"
types:
  logger:
    package: myapp
    type: Logger
    arguments: ["@db::"]
"#);
        let err = document.validate().expect_err("dangling selector");
        assert!(err.to_string().contains("argument 0"));
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let document = doc("types:\n  logger:\n    package: \"my-app\"\n    type: Logger\n");
        let err = document.validate().expect_err("bad path");
        assert!(err.to_string().contains("not a valid Rust path"));

        let document = doc("types:\n  logger:\n    package: myapp\n    type: \"Log-ger\"\n");
        let err = document.validate().expect_err("bad ident");
        assert!(err.to_string().contains("not a valid Rust identifier"));
    }

    #[test]
    fn test_rejects_bad_type_ids() {
        for id in ["\"@logger\"", "\"%logger%\"", "\"a::b\""] {
            let yaml = format!("types:\n  {id}:\n    alias: \"@x\"\n");
            let err = doc(&yaml).validate().expect_err("bad id");
            assert!(err.to_string().contains("type ID"), "id {id} gave {err}");
        }
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let document = doc("parameters:\n  \"po%rt\": 1\n");
        let err = document.validate().expect_err("percent in name");
        assert!(err.to_string().contains("must not contain '%'"));

        let document = doc("parameters:\n  big: 10000000000000000000\n");
        let err = document.validate().expect_err("out of range");
        assert!(err.to_string().contains("integer literal out of range"));

        let document = doc("parameters:\n  odd: !tag 1\n");
        let err = document.validate().expect_err("tagged");
        assert!(err.to_string().contains("tagged YAML values are not supported"));
    }

    #[test]
    fn test_unknown_keys_fail_to_parse() {
        let err = Document::from_yaml("types:\n  x:\n    factroy: make\n")
            .expect_err("typo must not be silently dropped");
        assert!(err.to_string().contains("factroy"));
    }

    #[test]
    fn test_is_rust_ident() {
        assert!(is_rust_ident("register_types"));
        assert!(is_rust_ident("_private"));
        assert!(is_rust_ident("V2"));
        assert!(!is_rust_ident(""));
        assert!(!is_rust_ident("2fast"));
        assert!(!is_rust_ident("my-mod"));
        assert!(is_rust_path("myapp::logging"));
        assert!(!is_rust_path("myapp::"));
    }
}
