//! Embeddable chat widget.
//!
//! The widget itself is a third-party bundle served from a CDN. Opening it
//! injects a stylesheet link and a bootstrap module script into a host
//! document; closing removes both and empties the target container. The
//! document is abstracted behind [`WidgetHost`] so the lifecycle can run
//! without a browser.

use std::fmt;

use kisan_core::ChatConfig;

pub const CHAT_CONTAINER_ID: &str = "n8n-chat-container";
const STYLESHEET_FILE: &str = "style.css";
const BUNDLE_FILE: &str = "chat.bundle.es.js";

/// Narrow interface the rest of the app sees.
pub trait ChatWidget {
    /// Show the widget. Does nothing if it is already open.
    fn open_chat(&mut self);
    /// Tear the widget down. Does nothing if it is not open.
    fn close_chat(&mut self);
    fn is_open(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Head,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Stylesheet { href: String },
    ModuleScript { source: String },
}

/// A document the widget can be injected into.
pub trait WidgetHost {
    fn append(&mut self, slot: Slot, node: Node) -> NodeId;
    /// Returns whether the node was present.
    fn remove(&mut self, id: NodeId) -> bool;
    fn clear_container(&mut self, container_id: &str);
}

/// Options passed to the bundle's `createChat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetSettings {
    pub webhook_url: String,
    pub cdn_base_url: String,
    pub target: String,
    pub show_welcome_screen: bool,
    pub show_floating_chat_button: bool,
}

impl From<&ChatConfig> for WidgetSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            webhook_url: config.webhook_url.clone(),
            cdn_base_url: config.cdn_base_url.trim_end_matches('/').to_string(),
            target: format!("#{}", CHAT_CONTAINER_ID),
            show_welcome_screen: true,
            show_floating_chat_button: false,
        }
    }
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl WidgetSettings {
    pub fn stylesheet_url(&self) -> String {
        format!("{}/{}", self.cdn_base_url, STYLESHEET_FILE)
    }

    pub fn bundle_url(&self) -> String {
        format!("{}/{}", self.cdn_base_url, BUNDLE_FILE)
    }

    /// Module script that imports the bundle and creates the chat.
    pub fn bootstrap_script(&self) -> String {
        // JSON string literals are valid JavaScript string literals.
        let js = |s: &str| serde_json::Value::from(s).to_string();
        format!(
            "import {{ createChat }} from {bundle};\n\n\
             createChat({{\n  \
               webhookUrl: {webhook},\n  \
               target: {target},\n  \
               showWelcomeScreen: {welcome},\n  \
               showFloatingChatButton: {floating}\n\
             }});\n",
            bundle = js(&self.bundle_url()),
            webhook = js(&self.webhook_url),
            target = js(&self.target),
            welcome = self.show_welcome_screen,
            floating = self.show_floating_chat_button,
        )
    }
}

/// [`ChatWidget`] backed by the CDN bundle.
pub struct EmbeddedChat<H: WidgetHost> {
    host: H,
    settings: WidgetSettings,
    injected: Option<(NodeId, NodeId)>,
}

impl<H: WidgetHost> EmbeddedChat<H> {
    pub fn new(host: H, settings: WidgetSettings) -> Self {
        Self {
            host,
            settings,
            injected: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn settings(&self) -> &WidgetSettings {
        &self.settings
    }
}

impl<H: WidgetHost> ChatWidget for EmbeddedChat<H> {
    fn open_chat(&mut self) {
        if self.injected.is_some() {
            tracing::debug!("Chat widget already open");
            return;
        }

        let link = self.host.append(
            Slot::Head,
            Node::Stylesheet {
                href: self.settings.stylesheet_url(),
            },
        );
        let script = self.host.append(
            Slot::Body,
            Node::ModuleScript {
                source: self.settings.bootstrap_script(),
            },
        );
        self.injected = Some((link, script));
        tracing::info!("Chat widget opened");
    }

    fn close_chat(&mut self) {
        let Some((link, script)) = self.injected.take() else {
            return;
        };

        if !self.host.remove(link) {
            tracing::warn!("Chat stylesheet was already removed");
        }
        if !self.host.remove(script) {
            tracing::warn!("Chat script was already removed");
        }
        self.host.clear_container(CHAT_CONTAINER_ID);
        tracing::info!("Chat widget closed");
    }

    fn is_open(&self) -> bool {
        self.injected.is_some()
    }
}

/// In-memory document that renders to a standalone HTML page.
#[derive(Debug, Default)]
pub struct HtmlHost {
    head: Vec<(NodeId, Node)>,
    body: Vec<(NodeId, Node)>,
    next_id: u64,
    container_clears: usize,
}

impl HtmlHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self, slot: Slot) -> impl Iterator<Item = &Node> {
        let nodes = match slot {
            Slot::Head => &self.head,
            Slot::Body => &self.body,
        };
        nodes.iter().map(|(_, node)| node)
    }

    pub fn container_clears(&self) -> usize {
        self.container_clears
    }

    /// The whole page as an HTML document.
    pub fn render(&self, title: &str) -> String {
        Page { host: self, title }.to_string()
    }
}

struct Page<'a> {
    host: &'a HtmlHost,
    title: &'a str,
}

impl fmt::Display for Page<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<!DOCTYPE html>")?;
        writeln!(f, "<html>")?;
        writeln!(f, "<head>")?;
        writeln!(f, "<meta charset=\"utf-8\">")?;
        writeln!(f, "<title>{}</title>", escape_html(self.title))?;
        for node in self.host.nodes(Slot::Head) {
            render_node(f, node)?;
        }
        writeln!(f, "</head>")?;
        writeln!(f, "<body>")?;
        writeln!(
            f,
            "<div id=\"{}\" style=\"min-height: 500px\"></div>",
            CHAT_CONTAINER_ID
        )?;
        for node in self.host.nodes(Slot::Body) {
            render_node(f, node)?;
        }
        writeln!(f, "</body>")?;
        writeln!(f, "</html>")
    }
}

impl WidgetHost for HtmlHost {
    fn append(&mut self, slot: Slot, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        match slot {
            Slot::Head => self.head.push((id, node)),
            Slot::Body => self.body.push((id, node)),
        }
        id
    }

    fn remove(&mut self, id: NodeId) -> bool {
        let before = self.head.len() + self.body.len();
        self.head.retain(|(node_id, _)| *node_id != id);
        self.body.retain(|(node_id, _)| *node_id != id);
        self.head.len() + self.body.len() != before
    }

    fn clear_container(&mut self, _container_id: &str) {
        // Nothing is rendered into the container server-side.
        self.container_clears += 1;
    }
}

fn render_node(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    match node {
        Node::Stylesheet { href } => {
            writeln!(f, "<link rel=\"stylesheet\" href=\"{}\">", escape_html(href))
        }
        Node::ModuleScript { source } => writeln!(
            f,
            "<script type=\"module\">\n{}</script>",
            source.replace("</", "<\\/")
        ),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> EmbeddedChat<HtmlHost> {
        EmbeddedChat::new(HtmlHost::new(), WidgetSettings::default())
    }

    #[test]
    fn test_default_settings() {
        let settings = WidgetSettings::default();
        assert_eq!(
            settings.stylesheet_url(),
            "https://cdn.jsdelivr.net/npm/@n8n/chat/dist/style.css"
        );
        assert_eq!(settings.target, "#n8n-chat-container");
        assert!(settings.show_welcome_screen);
        assert!(!settings.show_floating_chat_button);
    }

    #[test]
    fn test_bootstrap_script() {
        let script = WidgetSettings::default().bootstrap_script();
        assert!(script.contains(
            "import { createChat } from \"https://cdn.jsdelivr.net/npm/@n8n/chat/dist/chat.bundle.es.js\";"
        ));
        assert!(script.contains(
            "webhookUrl: \"https://n8n-lamm.onrender.com/webhook/9d63f026-b368-413b-827b-2a7048b26366/chat\""
        ));
        assert!(script.contains("showWelcomeScreen: true"));
        assert!(script.contains("showFloatingChatButton: false"));
    }

    #[test]
    fn test_open_injects_once() {
        let mut chat = widget();
        chat.open_chat();
        chat.open_chat();

        assert!(chat.is_open());
        assert_eq!(chat.host().nodes(Slot::Head).count(), 1);
        assert_eq!(chat.host().nodes(Slot::Body).count(), 1);
    }

    #[test]
    fn test_close_removes_nodes_and_clears_container() {
        let mut chat = widget();
        chat.open_chat();
        chat.close_chat();

        assert!(!chat.is_open());
        assert_eq!(chat.host().nodes(Slot::Head).count(), 0);
        assert_eq!(chat.host().nodes(Slot::Body).count(), 0);
        assert_eq!(chat.host().container_clears(), 1);

        chat.close_chat();
        assert_eq!(chat.host().container_clears(), 1);
    }

    #[test]
    fn test_reopen_after_close() {
        let mut chat = widget();
        chat.open_chat();
        chat.close_chat();
        chat.open_chat();
        assert!(chat.is_open());
        assert_eq!(chat.host().nodes(Slot::Head).count(), 1);
    }

    #[test]
    fn test_render_page() {
        let mut chat = widget();
        chat.open_chat();
        let html = chat.into_host().render("Kisan <Chat>");

        assert!(html.contains("<title>Kisan &lt;Chat&gt;</title>"));
        assert!(html.contains(
            "<link rel=\"stylesheet\" href=\"https://cdn.jsdelivr.net/npm/@n8n/chat/dist/style.css\">"
        ));
        assert!(html.contains("<div id=\"n8n-chat-container\""));
        assert!(html.contains("<script type=\"module\">"));
    }

    #[test]
    fn test_render_page_layout() {
        let mut host = HtmlHost::new();
        host.append(Slot::Body, Node::ModuleScript {
            source: "console.log('</script>');\n".into(),
        });
        let html = host.render("Chat");

        assert!(html.starts_with("<!DOCTYPE html>\n<html>\n<head>\n"));
        assert!(html.ends_with("</body>\n</html>\n"));
        assert!(html.contains("console.log('<\\/script>');"));

        let container = html.find("n8n-chat-container").unwrap();
        let script = html.find("<script").unwrap();
        assert!(container < script);
        assert_eq!(html.matches("</script>").count(), 1);
    }
}
