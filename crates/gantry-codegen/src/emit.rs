//! Генерация Rust-кода регистрации.
//!
//! Эмиссия детерминирована: параметры и типы выводятся в порядке
//! сортировки ключей, импорты подбираются под фактически используемые
//! конструкции. Результат - один исходный файл с функцией регистрации,
//! эквивалентной ручным вызовам контейнерного API.

use std::path::Path;

use tracing::debug;

use crate::config::{is_rust_ident, ConfigError, Document, TargetKind, TypeDef};

const HEADER: &str = "// @generated by gantry-gen, do not edit by hand.\n\n";

/// Генерирует исходник регистрации. `package` оборачивает код в
/// `pub mod`, `function` задаёт имя функции регистрации.
pub fn generate(
    doc: &Document,
    package: Option<&str>,
    function: &str,
) -> Result<String, ConfigError> {
    doc.validate()?;
    if !is_rust_ident(function) {
        return Err(ConfigError::BadIdentifier {
            what: "function",
            name: function.to_string(),
        });
    }
    if let Some(name) = package {
        if !is_rust_ident(name) {
            return Err(ConfigError::BadIdentifier {
                what: "package",
                name: name.to_string(),
            });
        }
    }

    let mut kinds = Vec::new();
    for (id, def) in &doc.types {
        kinds.push((id.as_str(), def, def.target(id)?));
    }

    let uses_describe = kinds
        .iter()
        .any(|(_, _, kind)| matches!(kind, TargetKind::Composite { .. }));
    let uses_value = !doc.parameters.is_empty()
        || kinds.iter().any(|(_, def, kind)| {
            !def.arguments.is_empty() || matches!(kind, TargetKind::FunctionValue { .. })
        });

    let mut imports = vec!["Container"];
    if uses_describe {
        imports.push("Describe");
    }
    if !kinds.is_empty() {
        imports.push("Factory");
    }
    if uses_value {
        imports.push("Value");
    }

    let mut body = String::new();
    for (name, value) in &doc.parameters {
        body.push_str(&format!(
            "    container.set_parameter({name:?}, {});\n",
            value_expr(value)
        ));
    }
    for (index, (id, def, kind)) in kinds.iter().enumerate() {
        if index > 0 || !doc.parameters.is_empty() {
            body.push('\n');
        }
        let mut expr = factory_expr(def, kind);
        if let Some((cfg_id, cfg_method)) = def.configurator_pair(id)? {
            expr = format!("Factory::configured({expr}, {cfg_id:?}, {cfg_method:?})");
        }
        body.push_str("    container.register(\n");
        body.push_str(&format!("        {id:?},\n"));
        body.push_str(&format!("        {expr},\n"));
        body.push_str("    );\n");
    }
    if body.is_empty() {
        // Пустой документ: параметр не должен давать предупреждение
        body.push_str("    let _ = container;\n");
    }

    let mut inner = String::new();
    inner.push_str(&format!("use gantry::{{{}}};\n\n", imports.join(", ")));
    inner.push_str(&format!("pub fn {function}(container: &Container) {{\n"));
    inner.push_str(&body);
    inner.push_str("}\n");

    let mut out = String::from(HEADER);
    match package {
        Some(name) => {
            out.push_str(&format!("pub mod {name} {{\n"));
            for line in inner.lines() {
                if line.is_empty() {
                    out.push('\n');
                } else {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
            out.push_str("}\n");
        }
        None => out.push_str(&inner),
    }

    debug!(
        types = kinds.len(),
        parameters = doc.parameters.len(),
        "generated registration source"
    );
    Ok(out)
}

/// Пишет сгенерированный файл. Возвращает `false`, если файл уже
/// существует и `overwrite` не задан; содержимое тогда не трогается.
pub fn write_generated(path: &Path, text: &str, overwrite: bool) -> Result<bool, ConfigError> {
    if path.exists() && !overwrite {
        return Ok(false);
    }
    std::fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(true)
}

fn factory_expr(def: &TypeDef, kind: &TargetKind) -> String {
    let args = args_expr(def);
    match kind {
        TargetKind::Composite { package, name } => {
            format!("Factory::structure({package}::{name}::shape(), {args})")
        }
        TargetKind::FactoryFn { package, name } => {
            format!("Factory::function({package}::{name}(), {args})")
        }
        TargetKind::Proxy { target, method } => {
            format!("Factory::proxy({target:?}, {method:?}, {args})")
        }
        TargetKind::MethodRef { target, method } => {
            format!("Factory::method_ref({target:?}, {method:?})")
        }
        TargetKind::FunctionValue { package, name } => {
            format!("Factory::instance(Value::from({package}::{name}()))")
        }
        TargetKind::Alias { target } => format!("Factory::alias({target:?})"),
    }
}

fn args_expr(def: &TypeDef) -> String {
    if def.arguments.is_empty() {
        "Vec::new()".to_string()
    } else {
        let parts: Vec<String> = def.arguments.iter().map(value_expr).collect();
        format!("vec![{}]", parts.join(", "))
    }
}

/// Выражение, строящее [`gantry::Value`] для литерала YAML.
fn value_expr(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => "Value::Null".to_string(),
        serde_yaml::Value::Bool(b) => format!("Value::from({b})"),
        serde_yaml::Value::Number(n) => number_expr(n),
        serde_yaml::Value::String(s) => format!("Value::from({s:?})"),
        serde_yaml::Value::Sequence(items) => {
            if items.is_empty() {
                "Value::List(Vec::new())".to_string()
            } else {
                let parts: Vec<String> = items.iter().map(value_expr).collect();
                format!("Value::List(vec![{}])", parts.join(", "))
            }
        }
        serde_yaml::Value::Mapping(entries) => {
            if entries.is_empty() {
                "Value::map(Vec::<(&str, Value)>::new())".to_string()
            } else {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(key, item)| {
                        let key = key.as_str().unwrap_or_default();
                        format!("({key:?}, {})", value_expr(item))
                    })
                    .collect();
                format!("Value::map([{}])", parts.join(", "))
            }
        }
        // Отвергнуто валидацией, сюда не доходит
        serde_yaml::Value::Tagged(_) => "Value::Null".to_string(),
    }
}

fn number_expr(n: &serde_yaml::Number) -> String {
    if let Some(v) = n.as_i64() {
        if v == i64::MIN {
            // -9223372036854775808i64 не лексится как литерал
            "Value::from(i64::MIN)".to_string()
        } else {
            format!("Value::from({v}i64)")
        }
    } else if let Some(v) = n.as_f64() {
        float_expr(v)
    } else {
        // За пределами i64: отвергнуто валидацией
        "Value::Null".to_string()
    }
}

fn float_expr(v: f64) -> String {
    if v.is_nan() {
        "Value::from(f64::NAN)".to_string()
    } else if v == f64::INFINITY {
        "Value::from(f64::INFINITY)".to_string()
    } else if v == f64::NEG_INFINITY {
        "Value::from(f64::NEG_INFINITY)".to_string()
    } else {
        format!("Value::from({v}f64)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Document;

    fn doc(yaml: &str) -> Document {
        Document::from_yaml(yaml).expect("well-formed yaml")
    }

    #[test]
    fn test_scalar_expressions() {
        let document = doc(r#"
parameters:
  null_value: ~
  flag: true
  count: 42
  ratio: 0.5
  name: app
"#);
        let source = generate(&document, None, "register_types").expect("generates");
        assert!(source.contains(r#"container.set_parameter("null_value", Value::Null);"#));
        assert!(source.contains(r#"container.set_parameter("flag", Value::from(true));"#));
        assert!(source.contains(r#"container.set_parameter("count", Value::from(42i64));"#));
        assert!(source.contains(r#"container.set_parameter("ratio", Value::from(0.5f64));"#));
        assert!(source.contains(r#"container.set_parameter("name", Value::from("app"));"#));
    }

    #[test]
    fn test_collection_expressions() {
        let document = doc(r#"
parameters:
  hosts: [a, b]
  limits:
    soft: 1
    hard: 2
"#);
        let source = generate(&document, None, "register_types").expect("generates");
        assert!(source.contains(
            r#"Value::List(vec![Value::from("a"), Value::from("b")])"#
        ));
        assert!(source.contains(
            r#"Value::map([("soft", Value::from(1i64)), ("hard", Value::from(2i64))])"#
        ));
    }

    #[test]
    fn test_extreme_numbers() {
        let document = doc("parameters:\n  low: -9223372036854775808\n");
        let source = generate(&document, None, "register_types").expect("generates");
        assert!(source.contains("Value::from(i64::MIN)"));
    }

    #[test]
    fn test_empty_document_keeps_parameter_used() {
        let source = generate(&Document::default(), None, "register_types").expect("generates");
        assert!(source.contains("pub fn register_types(container: &Container) {"));
        assert!(source.contains("let _ = container;"));
        assert!(source.contains("use gantry::{Container};"));
    }

    #[test]
    fn test_rejects_bad_function_name() {
        let err = generate(&Document::default(), None, "2fast").expect_err("bad ident");
        assert!(err.to_string().contains("not a valid Rust identifier"));

        let err = generate(&Document::default(), Some("my-mod"), "register_types")
            .expect_err("bad module");
        assert!(err.to_string().contains("not a valid Rust identifier"));
    }
}
