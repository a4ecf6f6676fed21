//! Search data model / 搜索数据模型
//!
//! `CategorizedResultSet` is the only mutable aggregate. It is grown
//! exclusively through [`CategorizedResultSet::merge`], which keeps two
//! invariants: urls are unique within a category, and `total()` always
//! equals the sum of per-category lengths.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};
use indexmap::IndexMap;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SearchError};

/// One search request, fixed for the lifetime of a session / 搜索请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    keyword: String,
    cloud_types: Vec<String>,
}

impl SearchQuery {
    /// Trims the keyword and rejects it if nothing is left / 关键词去空格后不能为空
    pub fn new(keyword: impl AsRef<str>) -> Result<Self> {
        let keyword = keyword.as_ref().trim();
        if keyword.is_empty() {
            return Err(SearchError::EmptyKeyword);
        }
        Ok(Self {
            keyword: keyword.to_string(),
            cloud_types: Vec::new(),
        })
    }

    /// Restrict the search to the given categories. Blank entries are
    /// dropped and duplicates collapse to their first occurrence.
    pub fn with_cloud_types<I, S>(mut self, cloud_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        self.cloud_types = cloud_types
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();
        self
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn cloud_types(&self) -> &[String] {
        &self.cloud_types
    }

    /// Wire body for `POST /api/search`
    pub fn to_request(&self) -> SearchRequest {
        SearchRequest {
            kw: self.keyword.clone(),
            res: "merge".to_string(),
            cloud_types: if self.cloud_types.is_empty() {
                None
            } else {
                Some(self.cloud_types.clone())
            },
        }
    }
}

/// A single shared link / 资源链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLink {
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_note")]
    pub note: String,
    /// Extraction code, if the share is protected / 提取码
    #[serde(
        default,
        deserialize_with = "deserialize_password",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub datetime: Option<DateTime<Utc>>,
}

impl ResourceLink {
    pub fn new(url: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            note: note.into(),
            password: None,
            datetime: None,
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn datetime(mut self, datetime: DateTime<Utc>) -> Self {
        self.datetime = Some(datetime);
        self
    }
}

fn deserialize_note<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_password<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|p| !p.trim().is_empty()))
}

fn deserialize_datetime<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_link_datetime))
}

/// Parse an RFC 3339 timestamp from the search API.
///
/// The API reports unknown times as `0001-01-01T00:00:00Z`, which maps to
/// `None` together with anything unparsable.
pub fn parse_link_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim()).ok()?;
    let parsed = parsed.with_timezone(&Utc);
    if parsed.year() <= 1 {
        None
    } else {
        Some(parsed)
    }
}

/// Links grouped by category, in arrival order / 按类型分组的搜索结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizedResultSet {
    categories: IndexMap<String, Vec<ResourceLink>>,
}

impl CategorizedResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of link counts across all categories
    pub fn total(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// True when no category key is present, even an empty one
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, category: &str) -> Option<&[ResourceLink]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    /// Categories in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ResourceLink])> {
        self.categories
            .iter()
            .map(|(category, links)| (category.as_str(), links.as_slice()))
    }

    /// Display order: link count descending, ties keep first-seen order.
    pub fn ordered_categories(&self) -> Vec<(&str, &[ResourceLink])> {
        let mut ordered: Vec<_> = self.iter().collect();
        ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        ordered
    }

    /// Merge another round into this one and return how many links were added.
    ///
    /// Per category, links whose url is already present (or repeated
    /// earlier in the same batch) are dropped; survivors are appended in
    /// arrival order. A category is only created when it gains a link.
    pub fn merge(&mut self, incoming: CategorizedResultSet) -> usize {
        incoming
            .categories
            .into_iter()
            .map(|(category, links)| self.extend_category(category, links))
            .sum()
    }

    fn extend_category(&mut self, category: String, links: Vec<ResourceLink>) -> usize {
        let mut seen: HashSet<String> = self
            .categories
            .get(&category)
            .map(|existing| existing.iter().map(|l| l.url.clone()).collect())
            .unwrap_or_default();

        let fresh: Vec<ResourceLink> = links
            .into_iter()
            .filter(|link| seen.insert(link.url.clone()))
            .collect();

        if fresh.is_empty() {
            return 0;
        }
        let added = fresh.len();
        self.categories.entry(category).or_default().extend(fresh);
        added
    }
}

impl FromIterator<(String, Vec<ResourceLink>)> for CategorizedResultSet {
    /// Builds a normalised set: the same de-duplication rules as `merge`,
    /// but every category key is kept, including ones that arrive empty.
    /// A first round that names a category still has something to backfill.
    fn from_iter<I: IntoIterator<Item = (String, Vec<ResourceLink>)>>(iter: I) -> Self {
        let mut set = CategorizedResultSet::new();
        for (category, links) in iter {
            set.categories.entry(category.clone()).or_default();
            set.extend_category(category, links);
        }
        set
    }
}

impl Serialize for CategorizedResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CategorizedResultSet", 2)?;
        state.serialize_field("total", &self.total())?;
        state.serialize_field("merged_by_type", &self.categories)?;
        state.end()
    }
}

/// Body of `POST /api/search` / 搜索请求体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRequest {
    pub kw: String,
    /// Result shape; always `merge` (grouped by type)
    pub res: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_types: Option<Vec<String>>,
}

/// Payload with results grouped by type
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchData {
    /// Server-reported total; ignored, recomputed from the links
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub merged_by_type: IndexMap<String, Vec<ResourceLink>>,
}

/// The API answers either with a `{code, message, data}` envelope or
/// with the data object directly. The bare form must carry
/// `merged_by_type` so a broken envelope is not mistaken for an empty one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Envelope {
        code: i64,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        data: Option<SearchData>,
    },
    Direct {
        #[serde(default)]
        total: Option<u64>,
        merged_by_type: IndexMap<String, Vec<ResourceLink>>,
    },
}

impl SearchResponse {
    pub fn into_result_set(self) -> Result<CategorizedResultSet> {
        let merged_by_type = match self {
            SearchResponse::Envelope { code, message, .. } if code != 0 => {
                return Err(SearchError::server(None, message));
            }
            SearchResponse::Envelope { data, .. } => data.unwrap_or_default().merged_by_type,
            SearchResponse::Direct { merged_by_type, .. } => merged_by_type,
        };
        Ok(merged_by_type.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(urls: &[&str]) -> Vec<ResourceLink> {
        urls.iter().map(|u| ResourceLink::new(*u, "")).collect()
    }

    fn set(groups: &[(&str, &[&str])]) -> CategorizedResultSet {
        groups
            .iter()
            .map(|(category, urls)| (category.to_string(), links(urls)))
            .collect()
    }

    fn urls(set: &CategorizedResultSet, category: &str) -> Vec<String> {
        set.get(category)
            .unwrap_or_default()
            .iter()
            .map(|l| l.url.clone())
            .collect()
    }

    #[test]
    fn test_query_trims_and_rejects_empty() {
        assert!(matches!(SearchQuery::new("   "), Err(SearchError::EmptyKeyword)));

        let query = SearchQuery::new("  example ")
            .unwrap()
            .with_cloud_types(["quark", " ", "baidu", "quark"]);
        assert_eq!(query.keyword(), "example");
        assert_eq!(query.cloud_types(), ["quark", "baidu"]);
    }

    #[test]
    fn test_request_omits_empty_cloud_types() {
        let request = SearchQuery::new("example").unwrap().to_request();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"kw": "example", "res": "merge"}));

        let request = SearchQuery::new("example")
            .unwrap()
            .with_cloud_types(["aliyun"])
            .to_request();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["cloud_types"], serde_json::json!(["aliyun"]));
    }

    #[test]
    fn test_merge_adds_only_unseen_urls() {
        let mut acc = set(&[("baidu", &["u1", "u2"])]);
        assert_eq!(acc.total(), 2);

        let added = acc.merge(set(&[("baidu", &["u2", "u3"]), ("quark", &["u4"])]));
        assert_eq!(added, 2);
        assert_eq!(urls(&acc, "baidu"), ["u1", "u2", "u3"]);
        assert_eq!(urls(&acc, "quark"), ["u4"]);
        assert_eq!(acc.total(), 4);
    }

    #[test]
    fn test_merge_is_idempotent_per_round() {
        let mut acc = set(&[("baidu", &["u1", "u2"]), ("quark", &["u3"])]);
        let round = set(&[("baidu", &["u2", "u1"]), ("quark", &["u3"])]);
        let before = acc.clone();

        assert_eq!(acc.merge(round.clone()), 0);
        assert_eq!(acc, before);
        assert_eq!(acc.merge(round), 0);
        assert_eq!(acc.total(), 3);
    }

    #[test]
    fn test_merge_dedupes_within_incoming_batch() {
        let mut acc = CategorizedResultSet::new();
        let added = acc.merge(set(&[("aliyun", &["a", "b", "a", "c", "b"])]));
        assert_eq!(added, 3);
        assert_eq!(urls(&acc, "aliyun"), ["a", "b", "c"]);
    }

    #[test]
    fn test_merge_preserves_earlier_rounds_first() {
        let mut acc = set(&[("pikpak", &["p3", "p1"])]);
        acc.merge(set(&[("pikpak", &["p0", "p1", "p2"])]));
        assert_eq!(urls(&acc, "pikpak"), ["p3", "p1", "p0", "p2"]);
    }

    #[test]
    fn test_merge_is_case_sensitive_and_per_category() {
        let mut acc = set(&[("baidu", &["https://pan.baidu.com/s/ABC"])]);
        let added = acc.merge(set(&[
            ("baidu", &["https://pan.baidu.com/s/abc"]),
            ("quark", &["https://pan.baidu.com/s/ABC"]),
        ]));
        assert_eq!(added, 2);
        assert_eq!(acc.total(), 3);
    }

    #[test]
    fn test_merge_skips_empty_new_category() {
        let mut acc = set(&[("baidu", &["u1"])]);
        let added = acc.merge(set(&[("baidu", &["u1"])]));
        assert_eq!(added, 0);

        let mut incoming = CategorizedResultSet::new();
        incoming.categories.insert("xunlei".to_string(), Vec::new());
        assert_eq!(acc.merge(incoming), 0);
        assert!(acc.get("xunlei").is_none());
        assert_eq!(acc.category_count(), 1);
    }

    #[test]
    fn test_decoded_empty_category_is_kept_and_filled_later() {
        let body = r#"{"merged_by_type": {"quark": []}}"#;
        let mut acc = serde_json::from_str::<SearchResponse>(body)
            .unwrap()
            .into_result_set()
            .unwrap();
        assert!(!acc.is_empty());
        assert_eq!(acc.total(), 0);

        assert_eq!(acc.merge(set(&[("quark", &["q1"])])), 1);
        assert_eq!(urls(&acc, "quark"), ["q1"]);
        assert_eq!(acc.category_count(), 1);
    }

    #[test]
    fn test_ordered_categories_stable_by_count() {
        let acc = set(&[
            ("magnet", &["m1"]),
            ("baidu", &["b1", "b2"]),
            ("quark", &["q1"]),
            ("aliyun", &["a1", "a2"]),
        ]);
        let order: Vec<&str> = acc.ordered_categories().into_iter().map(|(c, _)| c).collect();
        assert_eq!(order, ["baidu", "aliyun", "magnet", "quark"]);
    }

    #[test]
    fn test_decode_envelope_and_direct() {
        let body = r#"{
            "code": 0,
            "message": "success",
            "data": {
                "total": 99,
                "merged_by_type": {
                    "quark": [
                        {"url": "https://pan.quark.cn/s/1", "password": "", "note": "Movie", "datetime": "0001-01-01T00:00:00Z"},
                        {"url": "https://pan.quark.cn/s/2", "password": "ab12", "note": null, "datetime": "2024-05-01T08:30:00+08:00"}
                    ],
                    "baidu": []
                }
            }
        }"#;
        let result = serde_json::from_str::<SearchResponse>(body)
            .unwrap()
            .into_result_set()
            .unwrap();
        assert_eq!(result.total(), 2);
        assert_eq!(result.category_count(), 2);
        assert_eq!(result.get("baidu").map(<[_]>::len), Some(0));

        let quark = result.get("quark").unwrap();
        assert_eq!(quark[0].password, None);
        assert_eq!(quark[0].datetime, None);
        assert_eq!(quark[0].note, "Movie");
        assert_eq!(quark[1].password.as_deref(), Some("ab12"));
        assert_eq!(quark[1].note, "");
        assert_eq!(
            quark[1].datetime.map(|d| d.to_rfc3339()),
            Some("2024-05-01T00:30:00+00:00".to_string())
        );

        let direct = r#"{"total": 1, "merged_by_type": {"ed2k": [{"url": "ed2k://x"}]}}"#;
        let result = serde_json::from_str::<SearchResponse>(direct)
            .unwrap()
            .into_result_set()
            .unwrap();
        assert_eq!(urls(&result, "ed2k"), ["ed2k://x"]);
    }

    #[test]
    fn test_decode_envelope_error_code() {
        let body = r#"{"code": 400, "message": "keyword too short"}"#;
        let err = serde_json::from_str::<SearchResponse>(body)
            .unwrap()
            .into_result_set()
            .unwrap_err();
        assert_eq!(err.to_string(), "keyword too short");

        let broken = r#"{"code": 0, "data": {"merged_by_type": {"baidu": [{"note": "no url"}]}}}"#;
        assert!(serde_json::from_str::<SearchResponse>(broken).is_err());
    }

    #[test]
    fn test_serialize_includes_derived_total() {
        let acc = set(&[("baidu", &["u1", "u2"]), ("quark", &["u3"])]);
        let json = serde_json::to_value(&acc).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["merged_by_type"]["baidu"][1]["url"], "u2");
        assert!(json["merged_by_type"]["baidu"][0].get("password").is_none());
    }
}
