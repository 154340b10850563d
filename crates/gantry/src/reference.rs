//! Парсер текстовых ссылок на типы и параметры.
//!
//! Строковые аргументы фабрик несут ссылки в четырёх формах:
//! `@id` (обязательная ссылка), `@?id` (опциональная), `@id::Method`
//! (привязка метода) и `%name%` (подстановка параметра). Всё остальное
//! это литералы. Парсер проверяет только синтаксис - существование
//! целевого типа проверяет валидатор.

use crate::errors::DIError;

/// Строка является подстановкой параметра (`%name%`).
///
/// Требуется минимум один символ между процентами, поэтому `"%"` и
/// `"%%"` это литералы.
pub fn is_parameter(s: &str) -> bool {
    s.len() >= 3 && s.starts_with('%') && s.ends_with('%')
}

/// Строка является ссылкой на тип (`@id`, `@?id`, `@id::Method`).
pub fn is_type_reference(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('@')
}

/// Имя параметра без процентов, если строка является подстановкой.
pub fn parameter_name(s: &str) -> Option<&str> {
    if is_parameter(s) {
        // Оба процента ASCII, срез безопасен для любого UTF-8 внутри
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

/// Метод доступен для внешнего вызова (конфигуратором или селектором
/// `::Method`), если его имя начинается с заглавной буквы.
pub fn is_invokable_method(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Распарсенная ссылка на тип.
///
/// Инвариант: `id` непуст. Конструирование из пустой строки или из
/// формы без ID (`"@"`, `"@?"`, `"::M"`) завершается [`DIError::InvalidId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    id: String,
    optional: bool,
    method: Option<String>,
    raw: String,
}

impl TypeRef {
    /// Разбирает текстовую форму ссылки.
    ///
    /// Ведущий `@` опционален: `"logger"` и `"@logger"` дают одну и ту же
    /// ссылку. `?` сразу после `@` помечает ссылку опциональной.
    pub fn parse(raw: &str) -> Result<Self, DIError> {
        if raw.is_empty() {
            return Err(DIError::invalid_id(raw));
        }

        let mut rest = raw.strip_prefix('@').unwrap_or(raw);
        let optional = if let Some(stripped) = rest.strip_prefix('?') {
            rest = stripped;
            true
        } else {
            false
        };

        let (id, method) = match rest.split_once("::") {
            Some((id, method)) => {
                if method.is_empty() {
                    return Err(DIError::invalid_id(raw));
                }
                (id, Some(method.to_string()))
            }
            None => (rest, None),
        };

        if id.is_empty() {
            return Err(DIError::invalid_id(raw));
        }

        Ok(TypeRef {
            id: id.to_string(),
            optional,
            method,
            raw: raw.to_string(),
        })
    }

    /// Целевой type-ID без декораций.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ссылка помечена `@?`: отсутствие цели даёт Null вместо ошибки.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Селектор метода из формы `id::Method`.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Исходный текст до разбора, для сообщений об ошибках.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Нормализованная текстовая форма с ведущим `@`.
    pub fn canonical(&self) -> String {
        let mut out = String::with_capacity(self.raw.len() + 1);
        out.push('@');
        if self.optional {
            out.push('?');
        }
        out.push_str(&self.id);
        if let Some(method) = &self.method {
            out.push_str("::");
            out.push_str(method);
        }
        out
    }
}
