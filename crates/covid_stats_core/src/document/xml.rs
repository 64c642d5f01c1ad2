//! XML feed reader and writer.
//!
//! # Responsibility
//! - Parse `year > month > {unemployment > gender, deaths > cause}` feeds into
//!   flat records or the nested document.
//! - Write records or documents back to the same schema.
//!
//! # Invariants
//! - `year@value`, `month@name` and the `unemployment`/`deaths` elements are
//!   required; their absence is a fatal `XmlError`.
//! - `unemployment@national`, `deaths@total` and the `gender`/`cause` children
//!   are optional and map to `None` when absent; the writer omits `None`s.
//! - Writer output parses back to the same document.

use crate::model::stats::{
    DeathCounts, DocumentMetadata, MonthEntry, StatRecord, StatsDocument, UnemploymentRates,
    YearEntry,
};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::str::FromStr;

const ROOT_ELEMENT: &str = "statistics";
const COVID_CAUSE: &str = "COVID-19";
const OTHER_CAUSE: &str = "other";

pub type XmlResult<T> = Result<T, XmlError>;

/// Error raised while reading or writing the statistics feed.
#[derive(Debug)]
pub enum XmlError {
    /// Markup is not well-formed XML.
    Syntax(quick_xml::Error),
    /// An attribute is syntactically broken.
    Attribute(AttrError),
    Io(std::io::Error),
    /// Document ended before every element was closed, or had no root.
    UnexpectedEof,
    MissingElement {
        element: &'static str,
        context: String,
    },
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
        context: String,
    },
    InvalidNumber {
        field: String,
        value: String,
        context: String,
    },
}

impl Display for XmlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(err) => write!(f, "malformed XML: {err}"),
            Self::Attribute(err) => write!(f, "malformed XML attribute: {err}"),
            Self::Io(err) => write!(f, "XML output failed: {err}"),
            Self::UnexpectedEof => write!(f, "XML document ended unexpectedly"),
            Self::MissingElement { element, context } => {
                write!(f, "missing `{element}` element ({context})")
            }
            Self::MissingAttribute {
                element,
                attribute,
                context,
            } => write!(f, "missing `{element}@{attribute}` attribute ({context})"),
            Self::InvalidNumber {
                field,
                value,
                context,
            } => write!(f, "invalid number `{value}` for {field} ({context})"),
        }
    }
}

impl Error for XmlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Syntax(err) => Some(err),
            Self::Attribute(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for XmlError {
    fn from(value: quick_xml::Error) -> Self {
        Self::Syntax(value)
    }
}

impl From<AttrError> for XmlError {
    fn from(value: AttrError) -> Self {
        Self::Attribute(value)
    }
}

impl From<std::io::Error> for XmlError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Parses the feed into one flat record per month, in document order.
pub fn read_records(xml: &str) -> XmlResult<Vec<StatRecord>> {
    Ok(read_document(xml)?.to_records())
}

/// Parses the feed into the nested primary document.
pub fn read_document(xml: &str) -> XmlResult<StatsDocument> {
    let root = parse_tree(xml)?;
    let mut document = StatsDocument::with_metadata(DocumentMetadata {
        country: root.attribute("country").map(str::to_string),
        source: root.attribute("source").map(str::to_string),
        last_update: root.attribute("lastUpdate").map(str::to_string),
    });

    for year_elem in root.children_named("year") {
        let year_text = year_elem.required_attribute("year", "value", "root")?;
        let year: i32 = parse_number("year@value", year_text, "root")?;
        let mut entry = YearEntry {
            year,
            months: Vec::new(),
        };
        for month_elem in year_elem.children_named("month") {
            entry.months.push(read_month(year, month_elem)?);
        }
        document.data.push(entry);
    }

    Ok(document)
}

fn read_month(year: i32, month_elem: &Element) -> XmlResult<MonthEntry> {
    let year_context = format!("year={year}");
    let name = month_elem.required_attribute("month", "name", &year_context)?;
    let context = format!("year={year} month={name}");

    let unemployment_elem =
        month_elem
            .child("unemployment")
            .ok_or_else(|| XmlError::MissingElement {
                element: "unemployment",
                context: context.clone(),
            })?;
    let mut unemployment = UnemploymentRates {
        national: optional_number(unemployment_elem, "national", &context)?,
        male: None,
        female: None,
    };
    for gender in unemployment_elem.children_named("gender") {
        let slot = match gender.attribute("sex") {
            Some("male") => &mut unemployment.male,
            Some("female") => &mut unemployment.female,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(parse_number("gender", gender.text.trim(), &context)?);
        }
    }

    let deaths_elem = month_elem
        .child("deaths")
        .ok_or_else(|| XmlError::MissingElement {
            element: "deaths",
            context: context.clone(),
        })?;
    let mut deaths = DeathCounts {
        total: optional_number(deaths_elem, "total", &context)?,
        covid: None,
        other: None,
    };
    for cause in deaths_elem.children_named("cause") {
        let slot = match cause.attribute("type") {
            Some(COVID_CAUSE) => &mut deaths.covid,
            Some(OTHER_CAUSE) => &mut deaths.other,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(parse_number("cause", cause.text.trim(), &context)?);
        }
    }

    Ok(MonthEntry {
        name: name.to_string(),
        unemployment,
        deaths,
    })
}

/// Writes flat records, grouping them by year in first-appearance order.
pub fn write_records(records: &[StatRecord], metadata: &DocumentMetadata) -> XmlResult<String> {
    write_document(&StatsDocument::from_records(metadata.clone(), records))
}

/// Writes the nested document as an indented UTF-8 feed.
pub fn write_document(document: &StatsDocument) -> XmlResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = BytesStart::new(ROOT_ELEMENT);
    if let Some(country) = document.country.as_deref() {
        root.push_attribute(("country", country));
    }
    if let Some(source) = document.source.as_deref() {
        root.push_attribute(("source", source));
    }
    if let Some(last_update) = document.last_update.as_deref() {
        root.push_attribute(("lastUpdate", last_update));
    }
    writer.write_event(Event::Start(root))?;

    for entry in &document.data {
        let value = entry.year.to_string();
        let mut year_elem = BytesStart::new("year");
        year_elem.push_attribute(("value", value.as_str()));
        writer.write_event(Event::Start(year_elem))?;
        for month in &entry.months {
            write_month(&mut writer, month)?;
        }
        writer.write_event(Event::End(BytesEnd::new("year")))?;
    }

    writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;
    let bytes = writer.into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_month<W: Write>(writer: &mut Writer<W>, month: &MonthEntry) -> XmlResult<()> {
    let mut month_elem = BytesStart::new("month");
    month_elem.push_attribute(("name", month.name.as_str()));
    writer.write_event(Event::Start(month_elem))?;

    let mut unemployment_elem = BytesStart::new("unemployment");
    if let Some(national) = month.unemployment.national {
        unemployment_elem.push_attribute(("national", national.to_string().as_str()));
    }
    writer.write_event(Event::Start(unemployment_elem))?;
    write_optional_child(writer, "gender", ("sex", "male"), month.unemployment.male)?;
    write_optional_child(writer, "gender", ("sex", "female"), month.unemployment.female)?;
    writer.write_event(Event::End(BytesEnd::new("unemployment")))?;

    let mut deaths_elem = BytesStart::new("deaths");
    if let Some(total) = month.deaths.total {
        deaths_elem.push_attribute(("total", total.to_string().as_str()));
    }
    writer.write_event(Event::Start(deaths_elem))?;
    write_optional_child(writer, "cause", ("type", COVID_CAUSE), month.deaths.covid)?;
    write_optional_child(writer, "cause", ("type", OTHER_CAUSE), month.deaths.other)?;
    writer.write_event(Event::End(BytesEnd::new("deaths")))?;

    writer.write_event(Event::End(BytesEnd::new("month")))?;
    Ok(())
}

fn write_optional_child<W: Write, T: ToString>(
    writer: &mut Writer<W>,
    name: &str,
    attribute: (&str, &str),
    value: Option<T>,
) -> XmlResult<()> {
    let Some(value) = value else {
        return Ok(());
    };
    let mut elem = BytesStart::new(name);
    elem.push_attribute(attribute);
    writer.write_event(Event::Start(elem))?;
    writer.write_event(Event::Text(BytesText::new(&value.to_string())))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn optional_number<T: FromStr>(
    element: &Element,
    attribute: &'static str,
    context: &str,
) -> XmlResult<Option<T>> {
    element
        .attribute(attribute)
        .map(|value| parse_number(&format!("{}@{attribute}", element.name), value, context))
        .transpose()
}

fn parse_number<T: FromStr>(field: &str, value: &str, context: &str) -> XmlResult<T> {
    value.trim().parse().map_err(|_| XmlError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
        context: context.to_string(),
    })
}

/// Minimal owned element tree; the feed is small enough to hold in memory.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> XmlResult<Self> {
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn required_attribute(
        &self,
        element: &'static str,
        attribute: &'static str,
        context: &str,
    ) -> XmlResult<&str> {
        self.attribute(attribute)
            .ok_or_else(|| XmlError::MissingAttribute {
                element,
                attribute,
                context: context.to_string(),
            })
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }
}

fn parse_tree(xml: &str) -> XmlResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or(XmlError::UnexpectedEof)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::UnexpectedEof);
    }
    root.ok_or(XmlError::UnexpectedEof)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}
