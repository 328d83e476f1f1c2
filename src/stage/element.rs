//! Elements mounted on a stage and the factory that builds them

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::config::ProgressOptions;

/// Inline style declarations, keyed by CSS property name
pub type StyleMap = BTreeMap<String, String>;

/// `<tag>text</tag>` with a single text child
static SINGLE_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<([a-z]+)>([^<]*)</([a-z]+)>$").expect("valid template pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Block,
    None,
}

/// A styled child of the generated bar
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub classes: Vec<String>,
    pub style: Option<StyleMap>,
    pub text: String,
}

/// Line box, moving line and percentage label of the generated bar
#[derive(Debug, Clone, PartialEq)]
pub struct BarParts {
    pub track: Part,
    pub line: Part,
    pub label: Part,
    /// Horizontal translation of the line in percent, -100 (empty) to 0 (full)
    pub offset: f64,
}

impl BarParts {
    /// Fraction of the track covered by the line
    pub fn ratio(&self) -> f64 {
        ((self.offset + 100.0) / 100.0).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementContent {
    /// Generated progress bar
    Bar(BarParts),
    /// Caller-supplied markup; rendered as text
    Markup(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub classes: Vec<String>,
    pub style: Option<StyleMap>,
    pub display: Display,
    pub opacity: f64,
    pub content: ElementContent,
}

impl Element {
    /// Build the root element described by `options`
    pub fn from_options(options: &ProgressOptions) -> Self {
        let mut element = match options.template.as_deref().filter(|t| !t.is_empty()) {
            Some(template) => Self::from_template(template),
            None => Self::generated(options),
        };
        element.add_class(&options.custom_class);
        element
    }

    /// Parse caller markup
    ///
    /// A lone `<tag>text</tag>` becomes that element; anything else is
    /// wrapped in a `div` verbatim.
    pub fn from_template(template: &str) -> Self {
        let (tag, text) = match SINGLE_ELEMENT.captures(template.trim()) {
            Some(caps) if caps[1] == caps[3] => (caps[1].to_string(), caps[2].to_string()),
            _ => ("div".to_string(), template.to_string()),
        };
        Self {
            tag,
            classes: Vec::new(),
            style: None,
            display: Display::Block,
            opacity: 1.0,
            content: ElementContent::Markup(text),
        }
    }

    /// Full-screen wrapper with a hairline bar and a percentage label
    pub fn generated(options: &ProgressOptions) -> Self {
        let prefix = options.class_prefix.as_str();
        let css = |style: StyleMap| options.inline_style.then_some(style);

        let mut wrapper_style = style(&[
            ("position", "fixed"),
            ("top", "0"),
            ("right", "0"),
            ("bottom", "0"),
            ("left", "0"),
            ("z-index", "999"),
            ("background-color", "#fff"),
        ]);
        wrapper_style.extend(
            options
                .container_style
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        let track = Part {
            classes: class_list(prefix, &["progressbar-full"]),
            style: css(style(&[
                ("position", "absolute"),
                ("top", "50%"),
                ("left", "0"),
                ("width", "100%"),
                ("height", "1px"),
                ("overflow", "hidden"),
            ])),
            text: String::new(),
        };
        let line = Part {
            classes: class_list(prefix, &["progressbar-now"]),
            style: css(style(&[
                ("position", "absolute"),
                ("top", "0"),
                ("left", "0"),
                ("width", "100%"),
                ("height", "0"),
                ("border-top", "1px solid #000"),
            ])),
            text: String::new(),
        };
        let label = Part {
            classes: class_list(prefix, &["progress-val"]),
            style: css(style(&[
                ("position", "absolute"),
                ("bottom", "35px"),
                ("left", "0"),
                ("width", "100%"),
                ("text-align", "center"),
                ("font-size", "12px"),
                ("color", "#999"),
            ])),
            text: "0%".to_string(),
        };

        Self {
            tag: "div".to_string(),
            classes: class_list(prefix, &["progress-container"]),
            style: css(wrapper_style),
            display: Display::Block,
            opacity: 1.0,
            content: ElementContent::Bar(BarParts {
                track,
                line,
                label,
                offset: -100.0,
            }),
        }
    }

    /// Append a class unless it is empty or already present
    pub fn add_class(&mut self, class: &str) {
        let class = class.trim();
        if !class.is_empty() && !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn bar(&self) -> Option<&BarParts> {
        match &self.content {
            ElementContent::Bar(parts) => Some(parts),
            ElementContent::Markup(_) => None,
        }
    }

    pub fn bar_mut(&mut self) -> Option<&mut BarParts> {
        match &mut self.content {
            ElementContent::Bar(parts) => Some(parts),
            ElementContent::Markup(_) => None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.display == Display::None
    }

    pub fn style_value(&self, property: &str) -> Option<&str> {
        self.style.as_ref()?.get(property).map(String::as_str)
    }
}

/// Prefix every name with `{prefix}-`
pub fn class_list(prefix: &str, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|name| format!("{}-{}", prefix, name))
        .collect()
}

fn style(pairs: &[(&str, &str)]) -> StyleMap {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_element_classes_and_styles() {
        let mut options = ProgressOptions::default();
        options.class_prefix = "app".to_string();
        options.custom_class = "splash".to_string();
        options
            .container_style
            .insert("background-color".to_string(), "#222".to_string());

        let element = Element::from_options(&options);
        assert_eq!(element.classes, vec!["app-progress-container", "splash"]);
        assert_eq!(element.style_value("background-color"), Some("#222"));
        assert_eq!(element.style_value("z-index"), Some("999"));

        let bar = element.bar().unwrap();
        assert_eq!(bar.label.text, "0%");
        assert_eq!(bar.label.classes, vec!["app-progress-val"]);
        assert_eq!(bar.ratio(), 0.0);
    }

    #[test]
    fn test_inline_style_disabled() {
        let options = ProgressOptions {
            inline_style: false,
            ..ProgressOptions::default()
        };
        let element = Element::generated(&options);
        assert!(element.style.is_none());
        assert!(element.bar().unwrap().line.style.is_none());
    }

    #[test]
    fn test_single_element_template() {
        let element = Element::from_template("<p>Loading</p>");
        assert_eq!(element.tag, "p");
        assert_eq!(element.content, ElementContent::Markup("Loading".to_string()));
        assert!(element.bar().is_none());
    }

    #[test]
    fn test_complex_template_is_wrapped() {
        let markup = "<p>One</p><p>Two</p>";
        let element = Element::from_template(markup);
        assert_eq!(element.tag, "div");
        assert_eq!(element.content, ElementContent::Markup(markup.to_string()));

        let mismatched = Element::from_template("<p>text</span>");
        assert_eq!(mismatched.tag, "div");
    }

    #[test]
    fn test_custom_class_added_once() {
        let options = ProgressOptions {
            template: Some("<div>hi</div>".to_string()),
            custom_class: "x".to_string(),
            ..ProgressOptions::default()
        };
        let mut element = Element::from_options(&options);
        element.add_class("x");
        assert_eq!(element.classes, vec!["x"]);
    }
}
