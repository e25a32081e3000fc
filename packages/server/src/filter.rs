use sea_orm::{ColumnTrait, Condition};

use common::EventFilter;

use crate::entity::event;

/// Translate a captured `EventFilter` into a query condition over the event
/// store. All present fields are ANDed; an unconstrained filter matches
/// every stored event.
pub fn event_filter_condition(filter: &EventFilter) -> Condition {
    let mut condition = Condition::all();

    if !filter.event_ids.is_empty() {
        condition = condition.add(event::Column::EventId.is_in(filter.event_ids.clone()));
    }
    if let Some(ref event_type) = filter.event_type {
        condition = condition.add(event::Column::EventType.eq(event_type.clone()));
    }
    if let Some(from_date) = filter.from_date {
        condition = condition.add(event::Column::CreatedAt.gte(from_date));
    }
    if let Some(to_date) = filter.to_date {
        condition = condition.add(event::Column::CreatedAt.lte(to_date));
    }
    if let Some(ref source_system) = filter.source_system {
        condition = condition.add(event::Column::SourceSystem.eq(source_system.clone()));
    }
    if let Some(ref correlation_id) = filter.correlation_id {
        condition = condition.add(event::Column::CorrelationId.eq(correlation_id.clone()));
    }

    condition
}

#[cfg(test)]
mod tests {
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};

    use super::*;

    fn sql_for(filter: &EventFilter) -> String {
        event::Entity::find()
            .filter(event_filter_condition(filter))
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn test_unconstrained_filter_has_no_where_clause() {
        let sql = sql_for(&EventFilter::default());
        assert!(!sql.contains("WHERE"), "unexpected WHERE in: {sql}");
    }

    #[test]
    fn test_fields_combine_with_and() {
        let filter = EventFilter {
            event_type: Some("OrderCreated".into()),
            source_system: Some("OrderService".into()),
            ..Default::default()
        };
        let sql = sql_for(&filter);
        assert!(sql.contains("event_type"));
        assert!(sql.contains("source_system"));
        assert!(sql.contains("AND"));
    }

    #[test]
    fn test_id_list_becomes_in_clause() {
        let filter = EventFilter {
            event_ids: vec!["evt-1".into(), "evt-2".into()],
            ..Default::default()
        };
        let sql = sql_for(&filter);
        assert!(sql.contains("IN"));
        assert!(sql.contains("evt-1"));
        assert!(sql.contains("evt-2"));
    }
}
