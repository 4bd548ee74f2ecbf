//! Statement skeletons with ordered fill-ins.
//!
//! A template source is plain SQL text with `{slot}` fill-ins. `{{` and `}}`
//! produce literal braces. Sources are parsed once, when a dialect is
//! registered; rendering only walks the parsed segments.
//!
//! | Slot            | Renders                                                   |
//! |-----------------|-----------------------------------------------------------|
//! | `{table}`       | table name                                                |
//! | `{fields}`      | field set joined with `, `                                |
//! | `{named_fields}`| field set as `:name` placeholders joined with `, `        |
//! | `{filters}`     | ` AND <expr> = $i` per column                             |
//! | `{assignments}` | `, <expr> = $i` (or the merge form) per column but last   |
//! | `{id_param}`    | `$N`, N = number of values                                |
//! | `{column}`      | merge templates only: the assigned expression             |
//! | `{param}`       | merge templates only: the assigned placeholder            |

use crate::error::{OrmError, OrmResult};
use crate::fields::FieldSet;
use crate::value::Value;
use std::fmt::Write;
use std::str::FromStr;

/// The named statement templates every dialect provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    Select,
    Insert,
    Update,
    Delete,
}

impl TemplateName {
    pub const ALL: [TemplateName; 4] = [
        TemplateName::Select,
        TemplateName::Insert,
        TemplateName::Update,
        TemplateName::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateName::Select => "select",
            TemplateName::Insert => "insert",
            TemplateName::Update => "update",
            TemplateName::Delete => "delete",
        }
    }
}

impl std::fmt::Display for TemplateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateName {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| OrmError::shape(format!("unknown template {s:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Table,
    Fields,
    NamedFields,
    Filters,
    Assignments,
    IdParam,
    Column,
    Param,
}

impl Slot {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "table" => Slot::Table,
            "fields" => Slot::Fields,
            "named_fields" => Slot::NamedFields,
            "filters" => Slot::Filters,
            "assignments" => Slot::Assignments,
            "id_param" => Slot::IdParam,
            "column" => Slot::Column,
            "param" => Slot::Param,
            _ => return None,
        })
    }

    fn is_merge_slot(self) -> bool {
        matches!(self, Slot::Column | Slot::Param)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Slot),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template source.
    pub fn parse(source: &str) -> OrmResult<Self> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, c)| c) == Some('{') => {
                    chars.next();
                    text.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, c)) => name.push(c),
                            None => {
                                return Err(OrmError::Template(format!(
                                    "unclosed '{{' at byte {pos}"
                                )));
                            }
                        }
                    }
                    let slot = Slot::parse(name.trim()).ok_or_else(|| {
                        OrmError::Template(format!("unknown slot {{{name}}} at byte {pos}"))
                    })?;
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                '}' if chars.peek().map(|&(_, c)| c) == Some('}') => {
                    chars.next();
                    text.push('}');
                }
                '}' => {
                    return Err(OrmError::Template(format!(
                        "unmatched '}}' at byte {pos}"
                    )));
                }
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self { segments })
    }

    fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(slot) => Some(*slot),
            Segment::Text(_) => None,
        })
    }
}

/// Raw template sources for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct TemplateSource<'a> {
    pub select: &'a str,
    pub insert: &'a str,
    pub update: &'a str,
    pub delete: &'a str,
    /// Assignment used in `{assignments}` for JSON-typed values.
    pub merge: &'a str,
}

/// Parsed templates for one dialect.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    select: Template,
    insert: Template,
    update: Template,
    delete: Template,
    merge: Template,
}

impl TemplateSet {
    /// Parse and validate all templates of a dialect.
    pub fn parse(source: &TemplateSource<'_>) -> OrmResult<Self> {
        let statement = |name: &str, src: &str| -> OrmResult<Template> {
            let template = Template::parse(src)
                .map_err(|e| OrmError::Template(format!("{name}: {e}")))?;
            if template.slots().any(Slot::is_merge_slot) {
                return Err(OrmError::Template(format!(
                    "{name}: {{column}} and {{param}} are only valid in the merge template"
                )));
            }
            Ok(template)
        };

        let merge = Template::parse(source.merge)
            .map_err(|e| OrmError::Template(format!("merge: {e}")))?;
        if merge.slots().any(|slot| !slot.is_merge_slot()) {
            return Err(OrmError::Template(
                "merge: only {column} and {param} are valid".to_string(),
            ));
        }

        Ok(Self {
            select: statement("select", source.select)?,
            insert: statement("insert", source.insert)?,
            update: statement("update", source.update)?,
            delete: statement("delete", source.delete)?,
            merge,
        })
    }

    pub fn get(&self, name: TemplateName) -> &Template {
        match name {
            TemplateName::Select => &self.select,
            TemplateName::Insert => &self.insert,
            TemplateName::Update => &self.update,
            TemplateName::Delete => &self.delete,
        }
    }

    /// Render a named template.
    ///
    /// The error string is wrapped with template/dialect context by the caller.
    pub(crate) fn render(&self, name: TemplateName, ctx: &RenderContext<'_>) -> Result<String, String> {
        let mut out = String::with_capacity(128);
        for segment in &self.get(name).segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(slot) => self.fill(*slot, ctx, &mut out)?,
            }
        }
        Ok(out)
    }

    fn fill(&self, slot: Slot, ctx: &RenderContext<'_>, out: &mut String) -> Result<(), String> {
        match slot {
            Slot::Table => out.push_str(ctx.table),
            Slot::Fields => out.push_str(&ctx.fields.as_slice().join(", ")),
            Slot::NamedFields => {
                for (i, field) in ctx.fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push(':');
                    out.push_str(field);
                }
            }
            Slot::Filters => {
                for (i, column) in ctx.columns.iter().enumerate() {
                    let _ = write!(out, " AND {column} = ${}", i + 1);
                }
            }
            Slot::Assignments => {
                let Some(assigned) = ctx.columns.len().checked_sub(1) else {
                    return Err("update needs the identifier as its last column".to_string());
                };
                for (i, column) in ctx.columns[..assigned].iter().enumerate() {
                    let param = format!("${}", i + 1);
                    out.push_str(", ");
                    if ctx.values.get(i).is_some_and(Value::is_json) {
                        self.fill_merge(column, &param, out);
                    } else {
                        let _ = write!(out, "{column} = {param}");
                    }
                }
            }
            Slot::IdParam => {
                if ctx.values.is_empty() {
                    return Err("no identifier value".to_string());
                }
                let _ = write!(out, "${}", ctx.values.len());
            }
            Slot::Column | Slot::Param => {
                return Err(format!("slot {slot:?} is only valid in the merge template"));
            }
        }
        Ok(())
    }

    fn fill_merge(&self, column: &str, param: &str, out: &mut String) {
        for segment in &self.merge.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(Slot::Column) => out.push_str(column),
                Segment::Slot(_) => out.push_str(param),
            }
        }
    }
}

/// Data available to a template while rendering.
pub(crate) struct RenderContext<'a> {
    pub table: &'a str,
    pub fields: &'a FieldSet,
    pub columns: &'a [String],
    pub values: &'a [Value],
}
