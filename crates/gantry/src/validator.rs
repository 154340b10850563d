//! Статическая валидация контейнера.
//!
//! Материализация ленивая, поэтому дефекты wiring'а без валидации
//! всплывали бы по одному, при первом `get` каждого типа. Валидатор
//! прогоняет контейнер через упорядоченный список ограничений до
//! первого нарушения: явные дефекты фабрик, определённость параметров,
//! разрешимость обязательных ссылок и ацикличность графа.
//!
//! Обход всегда в отсортированном порядке type-ID, поэтому на одном и
//! том же контейнере валидатор детерминированно сообщает одну и ту же
//! первую ошибку.
//!
//! Список открыт: [`Validator::push`] добавляет пользовательские
//! ограничения после встроенных.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::container::Container;
use crate::errors::DIError;
use crate::reference::{self, TypeRef};
use crate::value::Value;

/// Одно проверяемое ограничение.
pub trait Constraint: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, container: &Container) -> Result<(), DIError>;
}

/// Упорядоченный список ограничений.
pub struct Validator {
    constraints: Vec<Box<dyn Constraint>>,
}

impl Validator {
    /// Валидатор со встроенными ограничениями в каноническом порядке.
    pub fn new() -> Self {
        Validator {
            constraints: vec![
                Box::new(NoInvalidFactories),
                Box::new(ParametersDefined),
                Box::new(AcyclicReferences),
            ],
        }
    }

    /// Валидатор без встроенных ограничений.
    pub fn empty() -> Self {
        Validator {
            constraints: Vec::new(),
        }
    }

    /// Добавляет ограничение в конец списка.
    pub fn push(&mut self, constraint: impl Constraint + 'static) {
        self.constraints.push(Box::new(constraint));
    }

    /// Прогоняет ограничения по порядку. Первое нарушение прекращает
    /// валидацию и возвращается обёрнутым в [`DIError::Validation`].
    pub fn validate(&self, container: &Container) -> Result<(), DIError> {
        for constraint in &self.constraints {
            debug!(constraint = constraint.name(), "🔍 checking constraint");
            if let Err(err) = constraint.check(container) {
                warn!(
                    constraint = constraint.name(),
                    error = %err,
                    "❌ constraint violated"
                );
                return Err(DIError::Validation {
                    source: Box::new(err),
                });
            }
        }
        debug!("✅ container validation passed");
        Ok(())
    }

    /// Panic-вариант для bootstrap кода: дефект wiring'а там фатален.
    pub fn must_validate(&self, container: &Container) {
        if let Err(err) = self.validate(container) {
            panic!("{err}");
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Validator::new()
    }
}

/// Ни одна фабрика не хранит дефект регистрации.
pub struct NoInvalidFactories;

impl Constraint for NoInvalidFactories {
    fn name(&self) -> &'static str {
        "no_invalid_factories"
    }

    fn check(&self, container: &Container) -> Result<(), DIError> {
        for id in container.type_ids() {
            let Some(factory) = container.factory(&id) else {
                continue;
            };
            if let Some(defect) = factory.registration_error() {
                return Err(DIError::invalid_factory(id, defect.to_string()));
            }
        }
        Ok(())
    }
}

/// Каждый `%name%` в декларированных аргументах определён в карте
/// параметров. Единственная строгая проверка параметров: резолвер
/// пропускает неопределённый плейсхолдер литералом.
pub struct ParametersDefined;

impl Constraint for ParametersDefined {
    fn name(&self) -> &'static str {
        "parameters_defined"
    }

    fn check(&self, container: &Container) -> Result<(), DIError> {
        for id in container.type_ids() {
            let Some(arguments) = container.declared_arguments(&id) else {
                continue;
            };
            for argument in arguments {
                let Value::Str(text) = argument else {
                    continue;
                };
                if let Some(name) = reference::parameter_name(&text) {
                    if !container.has_parameter(name) {
                        return Err(DIError::UndefinedParameter {
                            name: name.to_string(),
                            referenced_by: id,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Каждая обязательная ссылка разрешима, и граф ссылок ацикличен.
///
/// DFS с множеством посещаемых вдоль текущего пути. Опциональная
/// ссылка на незарегистрированный тип не ребро, но зарегистрированная
/// опциональная цель участвует в графе наравне с обязательной: цикл
/// через `@?id` остаётся циклом.
pub struct AcyclicReferences;

impl Constraint for AcyclicReferences {
    fn name(&self) -> &'static str {
        "acyclic_references"
    }

    fn check(&self, container: &Container) -> Result<(), DIError> {
        let ids = container.type_ids();
        let mut edges: HashMap<String, Vec<(String, bool)>> = HashMap::new();
        for id in &ids {
            let Some(arguments) = container.declared_arguments(id) else {
                continue;
            };
            let mut targets = Vec::new();
            for argument in arguments {
                let Value::Str(text) = argument else {
                    continue;
                };
                if !reference::is_type_reference(&text) {
                    continue;
                }
                if let Ok(parsed) = TypeRef::parse(&text) {
                    targets.push((parsed.id().to_string(), parsed.is_optional()));
                }
            }
            edges.insert(id.clone(), targets);
        }

        let mut done: HashSet<String> = HashSet::new();
        let mut visiting: HashSet<String> = HashSet::new();
        let mut path: Vec<String> = Vec::new();
        for id in &ids {
            if !done.contains(id.as_str()) {
                visit(container, &edges, id, &mut visiting, &mut path, &mut done)?;
            }
        }
        Ok(())
    }
}

fn visit(
    container: &Container,
    edges: &HashMap<String, Vec<(String, bool)>>,
    node: &str,
    visiting: &mut HashSet<String>,
    path: &mut Vec<String>,
    done: &mut HashSet<String>,
) -> Result<(), DIError> {
    visiting.insert(node.to_string());
    path.push(node.to_string());

    if let Some(targets) = edges.get(node) {
        for (target, optional) in targets {
            if !container.has(target) {
                if *optional {
                    continue;
                }
                return Err(DIError::unknown_reference(target, node));
            }
            if visiting.contains(target.as_str()) {
                // Цикл: хвост текущего пути от цели до узла, плюс цель
                // ещё раз, чтобы замкнуть картинку в сообщении
                let start = path.iter().position(|p| p == target).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].to_vec();
                cycle.push(target.clone());
                return Err(DIError::CycleDetected { path: cycle });
            }
            if !done.contains(target.as_str()) {
                visit(container, edges, target, visiting, path, done)?;
            }
        }
    }

    path.pop();
    visiting.remove(node);
    done.insert(node.to_string());
    Ok(())
}
