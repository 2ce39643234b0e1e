//! Option lists for teacher, subject and section selectors.
//!
//! Teachers, subjects and sections are soft-deleted by flipping `isActive`.
//! A deactivated record must stay visible wherever an existing schedule still
//! points at it, but it must not be offered for new assignments.

use std::collections::HashSet;
use thiserror::Error;

use crate::types::{Id, Schedule, Section, Subject, Teacher};

/// Something a schedule entry can point at.
pub trait Referencable {
    fn id(&self) -> &Id;
    fn is_active(&self) -> bool;
    /// Text shown in a selector.
    fn label(&self) -> String;
}

impl Referencable for Teacher {
    fn id(&self) -> &Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

impl Referencable for Subject {
    fn id(&self) -> &Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn label(&self) -> String {
        self.subject_name.clone()
    }
}

impl Referencable for Section {
    fn id(&self) -> &Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn label(&self) -> String {
        Section::label(self)
    }
}

/// Which reference of a schedule entry a selector edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefField {
    Teacher,
    Subject,
    Section,
}

impl RefField {
    /// Normalized id this schedule entry references, if any.
    pub fn of(self, schedule: &Schedule) -> Option<&Id> {
        let reference = match self {
            RefField::Teacher => schedule.teacher.as_ref(),
            RefField::Subject => schedule.subject.as_ref(),
            RefField::Section => schedule.section.as_ref(),
        };
        reference.map(|r| r.id())
    }

    pub fn name(self) -> &'static str {
        match self {
            RefField::Teacher => "teacher",
            RefField::Subject => "subject",
            RefField::Section => "section",
        }
    }
}

/// Ids referenced through `field` by any of the assignments.
pub fn used_ids(assignments: &[Schedule], field: RefField) -> HashSet<&Id> {
    assignments.iter().filter_map(|s| field.of(s)).collect()
}

/// Entities to show in a selector, in input order: every active entity plus
/// every inactive one still referenced by an assignment.
///
/// When `editing` points at an entity that is referenced but was filtered out,
/// it is appended. An entity that no longer exists at all is left out.
pub fn visible_entities<'a, E: Referencable>(
    entities: &'a [E],
    assignments: &[Schedule],
    field: RefField,
    editing: Option<&Schedule>,
) -> Vec<&'a E> {
    let used = used_ids(assignments, field);

    let mut visible: Vec<&E> = entities
        .iter()
        .filter(|e| e.is_active() || used.contains(e.id()))
        .collect();

    if let Some(edit_id) = editing.and_then(|s| field.of(s)) {
        let already_visible = visible.iter().any(|e| e.id() == edit_id);
        if used.contains(edit_id) && !already_visible {
            if let Some(original) = entities.iter().find(|e| e.id() == edit_id) {
                visible.push(original);
            }
        }
    }

    visible
}

/// A selector entry. Inactive entities are shown but only selectable when
/// they are the current value of the entry being edited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectOption<'a, E> {
    pub entity: &'a E,
    pub selectable: bool,
}

pub fn select_options<'a, E: Referencable>(
    entities: &'a [E],
    assignments: &[Schedule],
    field: RefField,
    editing: Option<&Schedule>,
) -> Vec<SelectOption<'a, E>> {
    let current = editing.and_then(|s| field.of(s));
    visible_entities(entities, assignments, field, editing)
        .into_iter()
        .map(|entity| SelectOption {
            selectable: entity.is_active() || Some(entity.id()) == current,
            entity,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChoiceError {
    #[error("unknown {field} {id}")]
    Unknown { field: &'static str, id: Id },

    #[error("{field} {id} is inactive and cannot be assigned")]
    Inactive { field: &'static str, id: Id },
}

/// Checks a submitted choice against the same rule the selector enforces.
///
/// Keeping the current reference of the edited entry is always allowed, even
/// if that entity was deactivated or removed since.
pub fn validate_choice<E: Referencable>(
    entities: &[E],
    field: RefField,
    chosen: &Id,
    editing: Option<&Schedule>,
) -> Result<(), ChoiceError> {
    if editing.and_then(|s| field.of(s)) == Some(chosen) {
        return Ok(());
    }

    match entities.iter().find(|e| e.id() == chosen) {
        None => Err(ChoiceError::Unknown {
            field: field.name(),
            id: chosen.clone(),
        }),
        Some(e) if !e.is_active() => Err(ChoiceError::Inactive {
            field: field.name(),
            id: chosen.clone(),
        }),
        Some(_) => Ok(()),
    }
}
