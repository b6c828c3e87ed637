use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Node parameters, keyed by parameter name.
pub type Params = Map<String, Value>;

/// What a node does when the workflow runs.
///
/// Every per-kind table (defaults, required/optional params, labels) is an
/// exhaustive `match` on this enum, so a new kind cannot be added without
/// filling all of them in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Start,
    End,
    Comment,
    VisitPage,
    ClickElement,
    InputText,
    ScrollPage,
    Pagination,
    Wait,
    Loop,
    ExtractData,
    #[default]
    Default,
}

impl NodeKind {
    pub const ALL: [NodeKind; 12] = [
        NodeKind::Start,
        NodeKind::End,
        NodeKind::Comment,
        NodeKind::VisitPage,
        NodeKind::ClickElement,
        NodeKind::InputText,
        NodeKind::ScrollPage,
        NodeKind::Pagination,
        NodeKind::Wait,
        NodeKind::Loop,
        NodeKind::ExtractData,
        NodeKind::Default,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Comment => "comment",
            NodeKind::VisitPage => "visit_page",
            NodeKind::ClickElement => "click_element",
            NodeKind::InputText => "input_text",
            NodeKind::ScrollPage => "scroll_page",
            NodeKind::Pagination => "pagination",
            NodeKind::Wait => "wait",
            NodeKind::Loop => "loop",
            NodeKind::ExtractData => "extract_data",
            NodeKind::Default => "default",
        }
    }

    /// Parse a `nodeType` string. Unrecognized values map to `Default` so
    /// documents from newer editors still load.
    pub fn parse(s: &str) -> Self {
        Self::lookup(s).unwrap_or(NodeKind::Default)
    }

    /// Strict lookup, for user input where a typo should be reported.
    pub fn lookup(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Label given to freshly created nodes.
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::End => "End",
            NodeKind::Comment => "Comment",
            NodeKind::VisitPage => "Visit page",
            NodeKind::ClickElement => "Click element",
            NodeKind::InputText => "Input text",
            NodeKind::ScrollPage => "Scroll page",
            NodeKind::Pagination => "Pagination",
            NodeKind::Wait => "Wait",
            NodeKind::Loop => "Loop",
            NodeKind::ExtractData => "Extract data",
            NodeKind::Default => "Process",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            NodeKind::Start => "Workflow entry point",
            NodeKind::End => "Workflow exit point",
            NodeKind::Comment => "Annotation, skipped at run time",
            NodeKind::VisitPage => "Navigate to a web address",
            NodeKind::ClickElement => "Click an element on the page",
            NodeKind::InputText => "Type text into an input field",
            NodeKind::ScrollPage => "Scroll the page in a direction or to an element",
            NodeKind::Pagination => "Follow the next-page button across result pages",
            NodeKind::Wait => "Wait for a duration or until a condition holds",
            NodeKind::Loop => "Repeat a number of times or until a condition holds",
            NodeKind::ExtractData => "Extract data from the page",
            NodeKind::Default => "Generic processing step",
        }
    }

    /// Parameters populated on a new node of this kind.
    pub fn default_params(self) -> Params {
        let value = match self {
            NodeKind::Start
            | NodeKind::End
            | NodeKind::Comment
            | NodeKind::Default => json!({}),
            NodeKind::VisitPage => json!({
                "url": "https://example.com",
                "wait_for_load": true,
                "timeout": 30000,
            }),
            NodeKind::ClickElement => json!({
                "selector": ".button",
                "selector_type": "css",
                "click_type": "single",
                "wait_timeout": 10000,
            }),
            NodeKind::InputText => json!({
                "selector": "input[type=\"text\"]",
                "text": "",
                "clear_first": true,
                "press_enter": false,
            }),
            NodeKind::ScrollPage => json!({
                "direction": "down",
                "distance": 500,
                "smooth": true,
            }),
            NodeKind::Pagination => json!({
                "next_button_selector": ".next-page",
                "max_pages": 10,
            }),
            NodeKind::Wait => json!({
                "wait_type": "time",
                "duration": 1000,
            }),
            NodeKind::Loop => json!({
                "loop_type": "count",
                "count": 1,
                "max_iterations": 100,
            }),
            NodeKind::ExtractData => json!({
                "selectors": { "title": "h1", "content": ".content" },
                "extract_type": "text",
                "multiple": false,
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    /// Parameters the execution service rejects a node without.
    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            NodeKind::Start | NodeKind::End | NodeKind::Comment | NodeKind::Default => &[],
            NodeKind::VisitPage => &["url"],
            NodeKind::ClickElement => &["selector"],
            NodeKind::InputText => &["selector", "text"],
            NodeKind::ScrollPage => &["direction"],
            NodeKind::Pagination => &["next_button_selector"],
            NodeKind::Wait => &["wait_type"],
            NodeKind::Loop => &["loop_type"],
            NodeKind::ExtractData => &["selectors"],
        }
    }

    pub fn optional_params(self) -> &'static [&'static str] {
        match self {
            NodeKind::Start | NodeKind::End | NodeKind::Comment | NodeKind::Default => &[],
            NodeKind::VisitPage => &["wait_for_load", "timeout"],
            NodeKind::ClickElement => &["selector_type", "wait_timeout", "click_type"],
            NodeKind::InputText => &["selector_type", "clear_first", "press_enter"],
            NodeKind::ScrollPage => &["distance", "target_selector", "smooth"],
            NodeKind::Pagination => &["max_pages", "stop_condition"],
            NodeKind::Wait => &["duration", "element_selector", "condition"],
            NodeKind::Loop => &["count", "condition", "max_iterations"],
            NodeKind::ExtractData => &["extract_type", "attribute_name", "multiple"],
        }
    }

    /// Whether the execution service has a step implementation for this kind.
    pub fn is_executable(self) -> bool {
        !matches!(self, NodeKind::Default)
    }

    /// Editor-only nodes that carry no parameters panel.
    pub fn is_structural(self) -> bool {
        matches!(self, NodeKind::Start | NodeKind::End | NodeKind::Comment)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        NodeKind::parse(&s)
    }
}

impl From<NodeKind> for String {
    fn from(k: NodeKind) -> Self {
        k.as_str().to_string()
    }
}

/// Renderer the editor uses for a node. Independent of `NodeKind`: a
/// `visit_page` step is drawn by the `default` container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    #[default]
    Default,
    Input,
    Output,
    Comment,
}

impl ContainerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerKind::Default => "default",
            ContainerKind::Input => "input",
            ContainerKind::Output => "output",
            ContainerKind::Comment => "comment",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "input" => ContainerKind::Input,
            "output" => ContainerKind::Output,
            "comment" => ContainerKind::Comment,
            _ => ContainerKind::Default,
        }
    }
}
