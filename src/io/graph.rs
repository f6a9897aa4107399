//! Job-graph model for the SNAP graph processing tool
//!
//! A graph is a list of named nodes. Each node runs one operator, reads from the
//! nodes named in its `sources` block and carries a free-form `parameters` tree.
//! The XML dialect is only touched in [`JobGraph::from_xml`] and
//! [`JobGraph::to_xml`]; everything else works on the typed structure.

use crate::types::{SarError, SarResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Generic XML element, used for parameter blocks and unknown graph children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_text<S: Into<String>, T: Into<String>>(name: S, text: T) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Rewrite every text node and attribute value of this subtree
    pub fn try_map_values<F>(&self, f: &mut F) -> SarResult<Element>
    where
        F: FnMut(&str) -> SarResult<String>,
    {
        let attributes = self
            .attributes
            .iter()
            .map(|(k, v)| Ok((k.clone(), f(v.as_str())?)))
            .collect::<SarResult<Vec<_>>>()?;
        let text = self.text.as_deref().map(&mut *f).transpose()?;
        let children = self
            .children
            .iter()
            .map(|c| c.try_map_values(&mut *f))
            .collect::<SarResult<Vec<_>>>()?;

        Ok(Element {
            name: self.name.clone(),
            attributes,
            text,
            children,
        })
    }

    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> SarResult<Element> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| SarError::Graph("Unbalanced closing tag".to_string()))?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let value = text.unescape()?;
                        current.text.get_or_insert_with(String::new).push_str(&value);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                        current.text.get_or_insert_with(String::new).push_str(&value);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(SarError::Graph(format!(
                "Unclosed element <{}>",
                stack[stack.len() - 1].name
            )));
        }
        root.ok_or_else(|| SarError::Graph("Empty graph document".to_string()))
    }

    fn from_start(start: &BytesStart) -> SarResult<Element> {
        let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            element.attributes.push((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                attribute.unescape_value()?.into_owned(),
            ));
        }
        Ok(element)
    }

    fn attach(
        stack: &mut [Element],
        root: &mut Option<Element>,
        element: Element,
    ) -> SarResult<()> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_none() => *root = Some(element),
            None => {
                return Err(SarError::Graph(
                    "Document has more than one root element".to_string(),
                ))
            }
        }
        Ok(())
    }

    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> SarResult<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_none() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if let Some(text) = &self.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// Reference from a node to the node it reads from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    /// Tag name inside `<sources>`, usually `sourceProduct`
    pub slot: String,
    pub refid: String,
}

/// One processing step
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub operator: String,
    pub sources: Vec<SourceRef>,
    pub parameters: Element,
}

impl GraphNode {
    /// Text value of a direct child of the parameter block
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.child(name).and_then(|p| p.text.as_deref())
    }

    /// Set a parameter value, adding the parameter if the block lacks it
    pub fn set_parameter(&mut self, name: &str, value: &str) {
        match self.parameters.child_mut(name) {
            Some(param) => param.text = Some(value.to_string()),
            None => self.parameters.children.push(Element::with_text(name, value)),
        }
    }

    fn from_element(element: &Element) -> SarResult<GraphNode> {
        let id = element
            .attribute("id")
            .ok_or_else(|| SarError::Graph("Graph node without id".to_string()))?
            .to_string();
        let operator = element
            .child("operator")
            .and_then(|o| o.text.clone())
            .ok_or_else(|| SarError::Graph(format!("Node {} has no operator", id)))?;

        let mut sources = Vec::new();
        if let Some(block) = element.child("sources") {
            for source in &block.children {
                // Older graphs put the node id in the text instead of `refid`
                let refid = source
                    .attribute("refid")
                    .map(str::to_string)
                    .or_else(|| source.text.clone())
                    .ok_or_else(|| {
                        SarError::Graph(format!("Source {} of node {} has no refid", source.name, id))
                    })?;
                sources.push(SourceRef {
                    slot: source.name.clone(),
                    refid,
                });
            }
        }

        let parameters = element
            .child("parameters")
            .cloned()
            .unwrap_or_else(|| Element::new("parameters"));

        Ok(GraphNode {
            id,
            operator,
            sources,
            parameters,
        })
    }

    fn to_element(&self) -> Element {
        let mut sources = Element::new("sources");
        for source in &self.sources {
            let mut slot = Element::new(source.slot.as_str());
            slot.attributes.push(("refid".to_string(), source.refid.clone()));
            sources.children.push(slot);
        }

        Element {
            name: "node".to_string(),
            attributes: vec![("id".to_string(), self.id.clone())],
            text: None,
            children: vec![
                Element::with_text("operator", self.operator.as_str()),
                sources,
                self.parameters.clone(),
            ],
        }
    }
}

/// Directed processing graph in execution order
#[derive(Debug, Clone, PartialEq)]
pub struct JobGraph {
    pub id: String,
    pub version: String,
    pub nodes: Vec<GraphNode>,
    /// Non-node children (e.g. `applicationData`), written back untouched
    pub extras: Vec<Element>,
}

impl JobGraph {
    pub fn from_xml(xml: &str) -> SarResult<JobGraph> {
        let root = Element::parse(xml)?;
        if root.name != "graph" {
            return Err(SarError::Graph(format!(
                "Expected <graph> root, found <{}>",
                root.name
            )));
        }

        let mut graph = JobGraph {
            id: root.attribute("id").unwrap_or("Graph").to_string(),
            version: "1.0".to_string(),
            nodes: Vec::new(),
            extras: Vec::new(),
        };

        for child in &root.children {
            match child.name.as_str() {
                "version" => {
                    if let Some(version) = &child.text {
                        graph.version = version.clone();
                    }
                }
                "node" => {
                    let node = GraphNode::from_element(child)?;
                    if graph.node(&node.id).is_some() {
                        return Err(SarError::Graph(format!("Duplicate node id {}", node.id)));
                    }
                    graph.nodes.push(node);
                }
                _ => graph.extras.push(child.clone()),
            }
        }

        Ok(graph)
    }

    pub fn to_xml(&self) -> SarResult<String> {
        let mut root = Element::new("graph");
        root.attributes.push(("id".to_string(), self.id.clone()));
        root.children.push(Element::with_text("version", self.version.as_str()));
        root.children.extend(self.nodes.iter().map(GraphNode::to_element));
        root.children.extend(self.extras.iter().cloned());

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        root.write(&mut writer)?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| SarError::Graph(format!("Serialized graph is not UTF-8: {}", e)))
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Remove a node and reconnect its consumers to its first upstream source
    pub fn prune_node(&mut self, node_id: &str) -> SarResult<()> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| SarError::NodeNotFound(node_id.to_string()))?;

        let upstream = self.nodes[index]
            .sources
            .first()
            .map(|s| s.refid.clone())
            .ok_or_else(|| {
                SarError::Graph(format!(
                    "Node {} has no upstream source to relink its consumers to",
                    node_id
                ))
            })?;

        self.nodes.remove(index);
        for node in &mut self.nodes {
            for source in node.sources.iter_mut().filter(|s| s.refid == node_id) {
                log::debug!("Relinking {} from {} to {}", node.id, node_id, upstream);
                source.refid = upstream.clone();
            }
        }
        Ok(())
    }

    /// Apply `f` to every parameter value and attribute of every node
    pub fn try_map_parameters<F>(&self, mut f: F) -> SarResult<JobGraph>
    where
        F: FnMut(&str) -> SarResult<String>,
    {
        let mut graph = self.clone();
        for node in &mut graph.nodes {
            node.parameters = node.parameters.try_map_values(&mut f)?;
        }
        Ok(graph)
    }

    /// Every source reference points at an existing node
    pub fn validate_links(&self) -> SarResult<()> {
        for node in &self.nodes {
            for source in &node.sources {
                if self.node(&source.refid).is_none() {
                    return Err(SarError::Graph(format!(
                        "Node {} reads from unknown node {}",
                        node.id, source.refid
                    )));
                }
            }
        }
        Ok(())
    }
}
