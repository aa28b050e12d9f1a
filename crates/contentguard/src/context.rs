use std::collections::HashMap;

/// Variable store scoped to a single request/response exchange.
///
/// The host fills it with the request body, headers and scanner verdicts; the
/// sanitization stages read from it and write their results back. A missing key
/// is never an error, it simply reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeContext {
	vars: HashMap<String, String>,
}

impl ExchangeContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.vars.get(key).map(String::as_str)
	}

	/// First non-empty value among `keys`, in order.
	pub fn resolve<K: AsRef<str>>(&self, keys: &[K]) -> Option<&str> {
		keys
			.iter()
			.filter_map(|k| self.get(k.as_ref()))
			.find(|v| !v.is_empty())
	}

	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.vars.insert(key.into(), value.into());
	}

	pub fn remove(&mut self, key: &str) -> Option<String> {
		self.vars.remove(key)
	}

	/// Flags are stored as `"true"` / `"false"` strings, as gateway hosts expect.
	pub fn set_flag(&mut self, key: impl Into<String>, value: bool) {
		self.set(key, if value { "true" } else { "false" });
	}

	pub fn flag(&self, key: &str) -> bool {
		self.get(key) == Some("true")
	}

	pub fn contains(&self, key: &str) -> bool {
		self.vars.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.vars.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vars.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExchangeContext {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut ctx = Self::new();
		ctx.extend(iter);
		ctx
	}
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for ExchangeContext {
	fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
		for (k, v) in iter {
			self.set(k, v);
		}
	}
}
