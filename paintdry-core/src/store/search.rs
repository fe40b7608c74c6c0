use paintdry_model::{
    ChangeRecord, ObservationRecord, ResourceRecord, SearchHit, SearchKind,
    SearchPage,
};
use serde_json::{Map, Value, json};

/// Clamp a requested page to 1 and return it with its row offset.
pub(crate) fn page_window(page: u32) -> (u32, u64) {
    let page = page.max(1);
    let offset = u64::from(page - 1) * u64::from(SearchPage::PER_PAGE);
    (page, offset)
}

pub(crate) fn kind_label(kind: SearchKind) -> &'static str {
    match kind {
        SearchKind::Resource => "resource",
        SearchKind::Observation => "observation",
        SearchKind::Change => "change",
    }
}

fn details(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub(crate) fn resource_hit(row: &ResourceRecord) -> SearchHit {
    SearchHit {
        kind: SearchKind::Resource,
        id: row.id,
        resource: row.resource.clone(),
        module: row.module.clone(),
        attribute: None,
        details: details(json!({
            "first_seen": row.first_seen,
            "last_seen": row.last_seen,
            "source": row.source,
        })),
    }
}

pub(crate) fn observation_hit(row: &ObservationRecord) -> SearchHit {
    SearchHit {
        kind: SearchKind::Observation,
        id: row.id,
        resource: row.resource.clone(),
        module: row.module.clone(),
        attribute: Some(row.attribute.clone()),
        details: details(json!({
            "first_seen": row.first_seen,
            "last_seen": row.last_seen,
            "value": row.value,
            "severity": row.severity,
        })),
    }
}

pub(crate) fn change_hit(row: &ChangeRecord) -> SearchHit {
    SearchHit {
        kind: SearchKind::Change,
        id: row.id,
        resource: row.resource.clone(),
        module: row.module.clone(),
        attribute: Some(row.attribute.clone()),
        details: details(json!({
            "timestamp": row.timestamp,
            "old_value": row.old_value,
            "new_value": row.new_value,
            "severity": row.severity,
        })),
    }
}

pub(crate) fn matches(hit: &SearchHit, needle: &str) -> bool {
    hit.resource.contains(needle)
        || hit.attribute.as_deref().is_some_and(|a| a.contains(needle))
        || hit.id.to_string().contains(needle)
        || kind_label(hit.kind).contains(needle)
        || Value::Object(hit.details.clone()).to_string().contains(needle)
}

/// Sort, count and cut one page out of already-filtered hits. Rows without
/// an attribute sort after rows with one, as they do in PostgreSQL.
pub(crate) fn paginate(query: &str, mut hits: Vec<SearchHit>, page: u32) -> SearchPage {
    let (page, offset) = page_window(page);
    hits.sort_by(|a, b| {
        (&a.resource, a.attribute.is_none(), &a.attribute, kind_label(a.kind), &a.module, a.id)
            .cmp(&(
                &b.resource,
                b.attribute.is_none(),
                &b.attribute,
                kind_label(b.kind),
                &b.module,
                b.id,
            ))
    });
    let total_results = hits.len() as u64;
    let results = hits
        .into_iter()
        .skip(offset as usize)
        .take(SearchPage::PER_PAGE as usize)
        .collect();

    SearchPage {
        query: query.to_string(),
        results,
        page,
        per_page: SearchPage::PER_PAGE,
        total_results,
        total_pages: SearchPage::total_pages_for(total_results),
    }
}
