//! Typed model of Gemini `generateContent` request and response bodies.
//!
//! Only the path down to part text is typed. Every node keeps the fields it does
//! not model in a `rest` map, and every typed slot falls back to an opaque JSON
//! value when the input has an unexpected shape, so parsing and serializing a
//! document never drops data or reorders keys.

use std::borrow::Cow;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::{Map, Number, Value};

use crate::{Phase, SanitizeError};

/// A slot in the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node<T> {
	/// The value had the expected shape
	Typed(T),
	/// Anything else, kept verbatim and ignored by traversal
	Opaque(Value),
	/// The field was not present in the input
	#[serde(skip)]
	Absent,
}

impl<T> Default for Node<T> {
	fn default() -> Self {
		Node::Absent
	}
}

impl<T> Node<T> {
	pub fn is_absent(&self) -> bool {
		matches!(self, Node::Absent)
	}

	pub fn typed(&self) -> Option<&T> {
		match self {
			Node::Typed(t) => Some(t),
			_ => None,
		}
	}

	pub fn typed_mut(&mut self) -> Option<&mut T> {
		match self {
			Node::Typed(t) => Some(t),
			_ => None,
		}
	}
}

/// An ordered list slot such as `contents`, `candidates` or `parts`.
pub type NodeList<T> = Node<Vec<Node<T>>>;

fn typed_items<T>(list: &NodeList<T>) -> impl Iterator<Item = &T> {
	list.typed().into_iter().flatten().filter_map(Node::typed)
}

fn typed_items_mut<T>(list: &mut NodeList<T>) -> impl Iterator<Item = &mut T> {
	list
		.typed_mut()
		.into_iter()
		.flatten()
		.filter_map(Node::typed_mut)
}

/// Declares a document node: one typed field plus every other field of the
/// input object, in input order.
///
/// The typed field is written back at the position it was read from, so a
/// round trip keeps the node's key order.
macro_rules! document_node {
	($(#[$meta:meta])* $name:ident { $field:ident: $ty:ty = $key:literal }) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Default, PartialEq)]
		pub struct $name {
			pub $field: $ty,
			pub rest: Map<String, Value>,
			/// Index of the typed field among the input's keys
			position: usize,
		}

		impl $name {
			pub const KEY: &'static str = $key;
		}

		impl Serialize for $name {
			fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
				let present = !self.$field.is_absent();
				let mut map = serializer.serialize_map(Some(self.rest.len() + usize::from(present)))?;
				let mut pending = present;
				for (i, (k, v)) in self.rest.iter().enumerate() {
					if pending && i == self.position {
						map.serialize_entry(Self::KEY, &self.$field)?;
						pending = false;
					}
					map.serialize_entry(k, v)?;
				}
				if pending {
					map.serialize_entry(Self::KEY, &self.$field)?;
				}
				map.end()
			}
		}

		impl<'de> Deserialize<'de> for $name {
			fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
				let fields = Map::<String, Value>::deserialize(deserializer)?;
				let mut node = Self::default();
				for (i, (k, v)) in fields.into_iter().enumerate() {
					if k == Self::KEY {
						node.position = i;
						node.$field = serde_json::from_value(v).map_err(<D::Error as de::Error>::custom)?;
					} else {
						node.rest.insert(k, v);
					}
				}
				Ok(node)
			}
		}
	};
}

/// The text a `text` value contributes: anything but null, false, zero and
/// the empty string. Scalars read as their plain string form, containers as
/// compact JSON.
fn text_of(value: &Value) -> Option<Cow<'_, str>> {
	match value {
		Value::Null | Value::Bool(false) => None,
		Value::Bool(true) => Some(Cow::Borrowed("true")),
		Value::String(s) if s.is_empty() => None,
		Value::String(s) => Some(Cow::Borrowed(s)),
		Value::Number(n) => number_text(n).map(Cow::Owned),
		Value::Array(_) | Value::Object(_) => Some(Cow::Owned(value.to_string())),
	}
}

fn number_text(n: &Number) -> Option<String> {
	match n.as_f64() {
		Some(f) if f == 0.0 => None,
		// 7.0 reads as "7"
		Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => Some(format!("{f:.0}")),
		_ => Some(n.to_string()),
	}
}

document_node! {
	Part { text: Node<String> = "text" }
}

impl Part {
	/// The part's text, if it carries any.
	pub fn text(&self) -> Option<Cow<'_, str>> {
		match &self.text {
			Node::Typed(s) if !s.is_empty() => Some(Cow::Borrowed(s)),
			Node::Opaque(v) => text_of(v),
			_ => None,
		}
	}

	/// Overwrite the text of a text-bearing part. Returns whether it was one.
	fn replace_text(&mut self, replacement: &str) -> bool {
		if self.text().is_none() {
			return false;
		}
		self.text = Node::Typed(replacement.to_string());
		true
	}
}

document_node! {
	/// A turn of the conversation, or a candidate's output
	Content { parts: NodeList<Part> = "parts" }
}

impl Content {
	pub fn parts(&self) -> impl Iterator<Item = &Part> {
		typed_items(&self.parts)
	}

	pub fn texts(&self) -> impl Iterator<Item = Cow<'_, str>> {
		self.parts().filter_map(|p| p.text())
	}

	fn parts_mut(&mut self) -> impl Iterator<Item = &mut Part> {
		typed_items_mut(&mut self.parts)
	}
}

document_node! {
	Candidate { content: Node<Content> = "content" }
}

document_node! {
	RequestDocument { contents: NodeList<Content> = "contents" }
}

document_node! {
	ResponseDocument { candidates: NodeList<Candidate> = "candidates" }
}

/// A request or response body, depending on the phase it was parsed for.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
	Request(RequestDocument),
	Response(ResponseDocument),
}

impl Document {
	/// Parse `raw` as the body for `phase`.
	///
	/// Fails only if `raw` is not JSON or its top level is not an object; any
	/// shape below that is accepted.
	pub fn parse(phase: Phase, raw: &str) -> Result<Self, SanitizeError> {
		let err = |source| SanitizeError::Document { phase, source };
		Ok(match phase {
			Phase::Prompt => Document::Request(serde_json::from_str(raw).map_err(err)?),
			Phase::Response => Document::Response(serde_json::from_str(raw).map_err(err)?),
		})
	}

	pub fn phase(&self) -> Phase {
		match self {
			Document::Request(_) => Phase::Prompt,
			Document::Response(_) => Phase::Response,
		}
	}

	/// Content blocks in document order.
	pub fn contents(&self) -> Vec<&Content> {
		match self {
			Document::Request(req) => typed_items(&req.contents).collect(),
			Document::Response(resp) => typed_items(&resp.candidates)
				.filter_map(|c| c.content.typed())
				.collect(),
		}
	}

	fn contents_mut(&mut self) -> Vec<&mut Content> {
		match self {
			Document::Request(req) => typed_items_mut(&mut req.contents).collect(),
			Document::Response(resp) => typed_items_mut(&mut resp.candidates)
				.filter_map(|c| c.content.typed_mut())
				.collect(),
		}
	}

	/// Every text fragment, depth first and left to right.
	pub fn fragments(&self) -> Vec<Cow<'_, str>> {
		self.contents().into_iter().flat_map(|c| c.texts()).collect()
	}

	/// All fragments concatenated with no separator.
	pub fn text(&self) -> String {
		self.fragments().concat()
	}

	/// Overwrite every text fragment with `replacement`, returning how many were
	/// replaced.
	pub fn replace_text(&mut self, replacement: &str) -> usize {
		let mut replaced = 0;
		for content in self.contents_mut() {
			for part in content.parts_mut() {
				if part.replace_text(replacement) {
					replaced += 1;
				}
			}
		}
		replaced
	}

	pub fn to_json(&self) -> Result<String, SanitizeError> {
		let phase = self.phase();
		let res = match self {
			Document::Request(req) => serde_json::to_string(req),
			Document::Response(resp) => serde_json::to_string(resp),
		};
		res.map_err(|source| SanitizeError::Serialize {
			phase,
			what: "document",
			source,
		})
	}
}

/// Extract the concatenated text of a serialized document.
pub fn extract_text(phase: Phase, raw: &str) -> Result<String, SanitizeError> {
	Ok(Document::parse(phase, raw)?.text())
}
