//! Combo form - field registry and update propagation
//!
//! Every change runs a fixed-point loop. A pass first copies values along
//! `affects` edges, then re-evaluates each field's activation and clearing
//! conditions. A pass that changed anything is followed by another one until
//! the form settles or the pass ceiling is hit.

use std::sync::Arc;

use combo_core::{
    ComboError, ComboResult, Condition, ConfigRef, ConfigRegistry, EngineConfig, FieldOptions,
    FieldStates, FieldType, FieldValue, Record, WidgetHandle,
};
use combo_transport::{match_response, LookupRequest, RemoteLookup, RemoteRecord};

use crate::{
    plan, ComboField, FilterBuilder, FormView, LookupOutcome, PendingLookup, Resolution,
    UpdateEvent, UpdateReport, ValueChange, Widget,
};

/// Condition results for one field in one pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Verdict {
    active: bool,
    clear: bool,
}

pub struct ComboForm {
    registry: Arc<ConfigRegistry>,
    lookup: Arc<dyn RemoteLookup>,
    config: EngineConfig,
    fields: Vec<ComboField>,
    pending: Vec<PendingLookup>,
    last_handle: WidgetHandle,
}

impl ComboForm {
    pub fn new(registry: Arc<ConfigRegistry>, lookup: Arc<dyn RemoteLookup>) -> Self {
        Self::with_config(registry, lookup, EngineConfig::default())
    }

    pub fn with_config(
        registry: Arc<ConfigRegistry>,
        lookup: Arc<dyn RemoteLookup>,
        config: EngineConfig,
    ) -> Self {
        ComboForm {
            registry,
            lookup,
            config,
            fields: Vec::new(),
            pending: Vec::new(),
            last_handle: WidgetHandle::ZERO,
        }
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- registration ----

    /// Attach a widget as a field of the form.
    ///
    /// The config is resolved by id or by type and the options are applied
    /// on top of it. An initial value is resolved without propagation, then
    /// the whole form is re-evaluated.
    pub fn register(
        &mut self,
        config_ref: impl Into<ConfigRef>,
        options: FieldOptions,
        widget: Box<dyn Widget>,
    ) -> ComboResult<WidgetHandle> {
        let (config_id, shared) = self.registry.resolve(&config_ref.into())?;
        let config = options.apply(&shared)?;
        let field_type = config.field_type.clone();
        if self.has_field(&field_type) {
            return Err(ComboError::DuplicateFieldType(field_type));
        }

        self.last_handle = self.last_handle.next();
        let handle = self.last_handle;
        let mut field = ComboField::new(handle, config_id, config, widget);
        field.set_hint(options.init_text.clone());
        self.fields.push(field);

        let report = match self.settle_new_field(handle, &field_type, options.value.as_deref()) {
            Ok(report) => report,
            Err(err) => {
                self.fields.retain(|f| f.handle() != handle);
                self.pending.retain(|p| p.handle() != handle);
                tracing::warn!(field_type = %field_type, "registration rolled back: {}", err);
                return Err(err);
            }
        };
        tracing::debug!(
            field_type = %field_type,
            handle = %handle,
            passes = report.passes,
            "field registered"
        );
        Ok(handle)
    }

    fn settle_new_field(
        &mut self,
        handle: WidgetHandle,
        field_type: &FieldType,
        raw: Option<&str>,
    ) -> ComboResult<UpdateReport> {
        if let Some(raw) = raw {
            let index = self.fields.len() - 1;
            self.assign_raw(index, raw)?;
        }
        self.update(UpdateEvent::forced(handle, field_type.clone()))
    }

    /// Detach a field and re-evaluate the rest of the form. Lookups still in
    /// flight for it are discarded when they complete.
    pub fn unregister(&mut self, field_type: &FieldType) -> ComboResult<ComboField> {
        let index = self.index_of(field_type)?;
        let field = self.fields.remove(index);
        self.pending.retain(|p| p.handle() != field.handle());
        self.update(UpdateEvent::settle())?;
        tracing::debug!(field_type = %field_type, "field unregistered");
        Ok(field)
    }

    // ---- accessors ----

    pub fn field(&self, field_type: &FieldType) -> Option<&ComboField> {
        self.fields.iter().find(|f| f.field_type() == field_type)
    }

    pub fn field_mut(&mut self, field_type: &FieldType) -> Option<&mut ComboField> {
        self.fields.iter_mut().find(|f| f.field_type() == field_type)
    }

    pub fn has_field(&self, field_type: &FieldType) -> bool {
        self.field(field_type).is_some()
    }

    pub fn fields(&self) -> &[ComboField] {
        &self.fields
    }

    pub fn view(&self) -> FormView<'_> {
        FormView::new(&self.fields)
    }

    pub fn get_data(&self, field_type: &FieldType) -> Option<&FieldValue> {
        self.field(field_type).map(ComboField::value)
    }

    pub fn get_id(&self, field_type: &FieldType) -> String {
        self.view().id_of(field_type)
    }

    pub fn get_text(&self, field_type: &FieldType) -> String {
        self.view().text_of(field_type)
    }

    pub fn is_set(&self, field_type: &FieldType) -> bool {
        self.view().is_set(field_type)
    }

    pub fn is_empty(&self, field_type: &FieldType) -> bool {
        self.field(field_type).map(ComboField::is_empty).unwrap_or(true)
    }

    pub fn is_enabled(&self, field_type: &FieldType) -> bool {
        self.field(field_type).map(ComboField::is_enabled).unwrap_or(false)
    }

    pub fn are_set(&self, types: &[FieldType], skip_missing: bool) -> bool {
        self.view().are_set(types, skip_missing)
    }

    // ---- mutations ----

    /// The user picked a value.
    pub fn select(&mut self, field_type: &FieldType, value: FieldValue) -> ComboResult<UpdateReport> {
        let index = self.index_of(field_type)?;
        let field = &mut self.fields[index];
        if field.is_busy() {
            return Err(ComboError::FieldBusy(field_type.clone()));
        }
        let handle = field.handle();
        match field.set_value(value, false) {
            Some(change) => self.update(UpdateEvent::user_change(
                handle,
                field_type.clone(),
                change.added,
                change.removed,
            )),
            None => Ok(UpdateReport::default()),
        }
    }

    /// The user picked a record from a search response. Multi-valued fields
    /// append it.
    pub fn select_remote(
        &mut self,
        field_type: &FieldType,
        record: &RemoteRecord,
    ) -> ComboResult<UpdateReport> {
        let field = self.field(field_type).ok_or_else(|| ComboError::FieldNotFound(field_type.clone()))?;
        let picked = field.record_from_remote(record);
        let value = if field.is_multiple() {
            let mut records = field.value().records().to_vec();
            if !records.iter().any(|r| r.key() == picked.key()) {
                records.push(picked);
            }
            FieldValue::Multiple(records)
        } else {
            FieldValue::single(picked)
        };
        self.select(field_type, value)
    }

    /// Set a value from code. No propagation along `affects`.
    pub fn set_value(&mut self, field_type: &FieldType, value: FieldValue) -> ComboResult<UpdateReport> {
        let index = self.index_of(field_type)?;
        let field = &mut self.fields[index];
        if field.is_busy() {
            field.end_lookup(true);
        }
        let handle = field.handle();
        match field.set_value(value, true) {
            Some(change) => self.update(UpdateEvent::programmatic(
                handle,
                field_type.clone(),
                change.added,
                change.removed,
            )),
            None => Ok(UpdateReport::default()),
        }
    }

    /// Set a value from an id and/or display text, resolving it the way
    /// initial values are resolved.
    pub fn set_data(
        &mut self,
        field_type: &FieldType,
        id: Option<&str>,
        text: Option<&str>,
    ) -> ComboResult<UpdateReport> {
        let index = self.index_of(field_type)?;
        let handle = self.fields[index].handle();
        match self.assign_data(index, id, text)? {
            Some(change) => self.update(UpdateEvent::programmatic(
                handle,
                field_type.clone(),
                change.added,
                change.removed,
            )),
            None => Ok(UpdateReport::default()),
        }
    }

    /// The user cleared a field.
    pub fn clear(&mut self, field_type: &FieldType) -> ComboResult<UpdateReport> {
        let multiple = self
            .field(field_type)
            .ok_or_else(|| ComboError::FieldNotFound(field_type.clone()))?
            .is_multiple();
        self.select(field_type, FieldValue::empty(multiple))
    }

    // ---- propagation ----

    /// Run passes until the form settles.
    ///
    /// A pass that skipped the origin field is always followed by a settle
    /// pass, so the origin's own conditions hold once `update` returns.
    pub fn update(&mut self, event: UpdateEvent) -> ComboResult<UpdateReport> {
        let origin = event.origin_type.clone();
        let mut report = UpdateReport::default();
        let mut origin_examined = event.force || event.origin.is_none();
        let mut event = event;

        loop {
            if report.passes >= self.config.max_passes {
                tracing::error!(
                    passes = report.passes,
                    origin = ?origin,
                    "update did not settle"
                );
                return Err(ComboError::PropagationLimit {
                    passes: report.passes,
                    origin,
                });
            }
            report.passes += 1;

            let dirty = self.run_pass(&event, &mut report)?;
            if !dirty && origin_examined {
                break;
            }
            event = UpdateEvent::settle();
            origin_examined = true;
        }

        tracing::trace!(
            origin = ?origin,
            passes = report.passes,
            mutations = report.mutations(),
            "form settled"
        );
        Ok(report)
    }

    /// One pass. Returns whether another pass is needed.
    fn run_pass(&mut self, event: &UpdateEvent, report: &mut UpdateReport) -> ComboResult<bool> {
        if !event.no_affect && !event.added.is_empty() {
            self.propagate(event, report)?;
        }

        let mut dirty = false;
        for index in 0..self.fields.len() {
            let handle = self.fields[index].handle();
            if !event.force && event.origin == Some(handle) {
                continue;
            }

            let verdict = Self::evaluate(&self.fields, index, event);
            let field = &mut self.fields[index];

            if verdict.active != field.is_enabled() && !field.is_readonly() {
                dirty = true;
            }
            if verdict.clear && !field.is_empty() {
                dirty = true;
            }

            if verdict.active {
                if field.enable() {
                    report.enabled += 1;
                }
            } else if field.disable() {
                report.disabled += 1;
            }
            if verdict.clear && field.clear() {
                report.cleared += 1;
            }
            field.emit_update(event);
        }
        Ok(dirty)
    }

    fn evaluate(fields: &[ComboField], index: usize, event: &UpdateEvent) -> Verdict {
        let view = FormView::new(fields);
        let config = fields[index].config();

        let active = match &config.active_when {
            None => true,
            Some(Condition::Fields(types)) => view.are_set(types, false),
            Some(Condition::Custom(f)) => f(&view),
        };

        let clear = match &config.clear_when {
            None => false,
            Some(Condition::Fields(types)) => {
                let origin_listed = !event.no_affect
                    && event.has_changes()
                    && event
                        .origin_type
                        .as_ref()
                        .map(|ty| types.contains(ty))
                        .unwrap_or(false);
                origin_listed || !view.are_set(types, true)
            }
            Some(Condition::Custom(f)) => f(&view),
        };

        Verdict { active, clear }
    }

    /// Copy the origin's first added record into each `affects` target.
    fn propagate(&mut self, event: &UpdateEvent, report: &mut UpdateReport) -> ComboResult<()> {
        let Some(origin) = event.origin.and_then(|h| self.index_of_handle(h)) else {
            return Ok(());
        };
        let Some(record) = event.added.first() else {
            return Ok(());
        };
        let origin_config = Arc::clone(self.fields[origin].config());

        for (target_type, rule) in &origin_config.affects {
            let Ok(target) = self.index_of(target_type) else {
                tracing::trace!(origin = %origin_config.field_type, target = %target_type, "affects target not on form");
                continue;
            };
            let keys = rule.keys(&origin_config, self.fields[target].key_policy());
            let id = keys.id.as_deref().and_then(|key| record.get_string(key));
            let text = record.get_string(&keys.value);
            if id.is_none() && text.is_none() {
                continue;
            }

            if self.assign_data(target, id.as_deref(), text.as_deref())?.is_some() {
                report.propagated += 1;
                tracing::trace!(
                    origin = %origin_config.field_type,
                    target = %target_type,
                    id = ?id,
                    "value propagated"
                );
            }
        }
        Ok(())
    }

    // ---- resolution ----

    fn assign_data(
        &mut self,
        index: usize,
        id: Option<&str>,
        text: Option<&str>,
    ) -> ComboResult<Option<ValueChange>> {
        let field = &mut self.fields[index];
        if field.key_policy().has_id() {
            field.set_hint(text.map(str::to_string));
        }
        let raw = id.or(text).unwrap_or_default();
        self.assign_raw(index, raw)
    }

    /// Resolve `raw` into the field without notification. A remote lookup
    /// leaves `{id, text: id}` in place and queues the lookup.
    fn assign_raw(&mut self, index: usize, raw: &str) -> ComboResult<Option<ValueChange>> {
        let separator = self.config.multiple_separator;
        let resolution = plan(&mut self.fields[index], raw, separator);

        match resolution {
            Resolution::Ready(value) => {
                let field = &mut self.fields[index];
                if field.is_busy() {
                    field.end_lookup(true);
                }
                Ok(field.set_value(value, true))
            }
            Resolution::Remote(ids) => {
                let request = {
                    let view = FormView::new(&self.fields);
                    FilterBuilder::lookup_request(&self.fields[index], &view, &ids[0])?
                };
                let field = &mut self.fields[index];
                let placeholder = ids.iter().map(|id| Record::new(id.as_str(), id.as_str())).collect();
                let change = field.set_value(FieldValue::from_records(placeholder, field.is_multiple()), true);
                let ticket = field.begin_lookup();
                tracing::debug!(
                    field_type = %field.field_type(),
                    url = %request.url,
                    ids = ?ids,
                    "resolving id remotely"
                );

                let pending = PendingLookup::new(
                    field.handle(),
                    field.field_type().clone(),
                    ticket,
                    ids,
                    self.lookup.lookup(request),
                );
                self.pending.push(pending);
                Ok(change)
            }
        }
    }

    /// Hand out the lookups started since the last call.
    pub fn take_pending(&mut self) -> Vec<PendingLookup> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Apply a finished lookup. Returns `Ok(false)` when the field is gone or
    /// a newer value superseded the lookup.
    pub fn apply_lookup(&mut self, outcome: LookupOutcome) -> ComboResult<bool> {
        let Some(index) = self.index_of_handle(outcome.handle) else {
            tracing::debug!(field_type = %outcome.field_type, "lookup for a detached field discarded");
            return Ok(false);
        };
        let field = &mut self.fields[index];
        if field.ticket() != outcome.ticket {
            tracing::debug!(field_type = %outcome.field_type, "superseded lookup discarded");
            return Ok(false);
        }
        field.end_lookup(false);

        let response = match outcome.result {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(field_type = %outcome.field_type, "lookup failed: {}", err);
                return Err(err);
            }
        };

        let key = field.key_policy().key().unwrap_or("id").to_string();
        let records = match_response(&outcome.ids, &response, &key);
        let value = FieldValue::from_records(records, field.is_multiple());
        let handle = field.handle();
        if let Some(change) = field.set_value(value, true) {
            self.update(UpdateEvent::programmatic(
                handle,
                outcome.field_type,
                change.added,
                change.removed,
            ))?;
        }
        Ok(true)
    }

    /// Wait for and apply every pending lookup, including ones started while
    /// applying. Returns how many were applied; the first failure is
    /// returned after all lookups have been drained.
    pub async fn resolve_pending(&mut self) -> ComboResult<usize> {
        let mut applied = 0;
        let mut first_error = None;

        loop {
            let pending = self.take_pending();
            if pending.is_empty() {
                break;
            }
            for lookup in pending {
                let outcome = lookup.wait().await;
                match self.apply_lookup(outcome) {
                    Ok(true) => applied += 1,
                    Ok(false) => {}
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(applied),
        }
    }

    // ---- search ----

    pub fn search_request(&self, field_type: &FieldType, term: &str) -> ComboResult<LookupRequest> {
        let field = self
            .field(field_type)
            .ok_or_else(|| ComboError::FieldNotFound(field_type.clone()))?;
        FilterBuilder::search_request(field, &self.view(), term, &self.config.primary_filter_suffix)
    }

    /// Search the field's endpoint for `term`.
    pub async fn search(&self, field_type: &FieldType, term: &str) -> ComboResult<Vec<Record>> {
        let request = self.search_request(field_type, term)?;
        let response = self.lookup.lookup(request).await?;
        let field = self
            .field(field_type)
            .ok_or_else(|| ComboError::FieldNotFound(field_type.clone()))?;
        Ok(response.iter().map(|r| field.record_from_remote(r)).collect())
    }

    fn index_of(&self, field_type: &FieldType) -> ComboResult<usize> {
        self.fields
            .iter()
            .position(|f| f.field_type() == field_type)
            .ok_or_else(|| ComboError::FieldNotFound(field_type.clone()))
    }

    fn index_of_handle(&self, handle: WidgetHandle) -> Option<usize> {
        self.fields.iter().position(|f| f.handle() == handle)
    }
}

impl std::fmt::Debug for ComboForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComboForm")
            .field("fields", &self.fields)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldEventKind, MemoryWidget};
    use combo_core::{AffectKeys, AffectRule, FieldConfig, FilterSpec, FilterTerm, RemoteQuery};
    use combo_transport::{NoLookup, StaticLookup};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn ty(name: &str) -> FieldType {
        FieldType::new(name)
    }

    fn rec(id: &str, text: &str) -> FieldValue {
        FieldValue::single(Record::new(id, text))
    }

    fn registry(configs: Vec<FieldConfig>) -> Arc<ConfigRegistry> {
        let registry = ConfigRegistry::new();
        for config in configs {
            registry.register_config(config).unwrap();
        }
        Arc::new(registry)
    }

    fn geo_configs() -> Vec<FieldConfig> {
        vec![
            FieldConfig::new("country", "country")
                .with_data(vec![Record::new("us", "USA"), Record::new("ca", "Canada")]),
            FieldConfig::new("state", "state")
                .with_active_when(Condition::fields(["country"]))
                .with_clear_when(Condition::fields(["country"])),
            FieldConfig::new("city", "city")
                .with_active_when(Condition::fields(["state"]))
                .with_clear_when(Condition::fields(["state"])),
        ]
    }

    fn form_with(configs: Vec<FieldConfig>, lookup: Arc<dyn RemoteLookup>) -> ComboForm {
        let types: Vec<FieldType> = configs.iter().map(|c| c.field_type.clone()).collect();
        let mut form = ComboForm::new(registry(configs), lookup);
        for field_type in types {
            form.register(field_type, FieldOptions::new(), MemoryWidget::new().boxed())
                .unwrap();
        }
        form
    }

    fn geo_form() -> ComboForm {
        form_with(geo_configs(), Arc::new(NoLookup))
    }

    fn client_lookup() -> Arc<StaticLookup> {
        Arc::new(StaticLookup::new().with_json_table(
            "/client/search",
            json!([{"id": 7, "client": "Acme"}, {"id": 9, "client": "Globex"}]),
        ))
    }

    fn client_config() -> FieldConfig {
        FieldConfig::new("client", "client/client").with_remote(RemoteQuery::new("/client/search"))
    }

    #[test]
    fn test_registration_disables_unmet_fields() {
        let form = geo_form();
        assert!(form.is_enabled(&ty("country")));
        assert!(!form.is_enabled(&ty("state")));
        assert!(!form.is_enabled(&ty("city")));
    }

    #[test]
    fn test_activation_chain() {
        let mut form = geo_form();

        let report = form.select(&ty("country"), rec("us", "USA")).unwrap();
        assert_eq!(report.enabled, 1);
        assert_eq!(report.passes, 2);
        assert!(form.is_enabled(&ty("state")));
        assert!(!form.is_enabled(&ty("city")));

        form.select(&ty("state"), rec("tx", "Texas")).unwrap();
        assert!(form.is_enabled(&ty("city")));
        form.select(&ty("city"), rec("austin", "Austin")).unwrap();

        let report = form.clear(&ty("state")).unwrap();
        assert_eq!(report.disabled, 1);
        assert_eq!(report.cleared, 1);
        assert!(form.is_enabled(&ty("state")));
        assert!(!form.is_enabled(&ty("city")));
        assert!(form.is_empty(&ty("city")));
        assert_eq!(form.get_id(&ty("country")), "us");
    }

    #[test]
    fn test_changing_origin_clears_listed_dependents() {
        let mut form = geo_form();
        form.select(&ty("country"), rec("us", "USA")).unwrap();
        form.select(&ty("state"), rec("tx", "Texas")).unwrap();
        form.select(&ty("city"), rec("austin", "Austin")).unwrap();

        let report = form.select(&ty("country"), rec("ca", "Canada")).unwrap();

        assert_eq!(report.cleared, 2);
        assert!(form.is_enabled(&ty("state")));
        assert!(form.is_empty(&ty("state")));
        assert!(!form.is_enabled(&ty("city")));
        assert!(form.is_empty(&ty("city")));
    }

    #[test]
    fn test_enable_and_clear_are_independent() {
        let configs = vec![
            FieldConfig::new("country", "country"),
            FieldConfig::new("state", "state"),
            FieldConfig::new("zip", "zip")
                .with_active_when(Condition::fields(["country"]))
                .with_clear_when(Condition::fields(["state"])),
        ];
        let mut form = form_with(configs, Arc::new(NoLookup));
        form.select(&ty("country"), rec("us", "USA")).unwrap();
        form.select(&ty("state"), rec("tx", "Texas")).unwrap();
        form.select(&ty("zip"), rec("78701", "78701")).unwrap();

        let report = form.select(&ty("state"), rec("ca", "California")).unwrap();

        assert_eq!(report.cleared, 1);
        assert!(form.is_enabled(&ty("zip")));
        assert!(form.is_empty(&ty("zip")));
    }

    #[test]
    fn test_settled_form_is_idempotent() {
        let mut form = geo_form();
        form.select(&ty("country"), rec("us", "USA")).unwrap();

        let report = form.update(UpdateEvent::settle()).unwrap();
        assert_eq!(report.passes, 1);
        assert_eq!(report.mutations(), 0);

        let unchanged = form.select(&ty("country"), rec("us", "USA")).unwrap();
        assert_eq!(unchanged, UpdateReport::default());
    }

    #[test]
    fn test_origin_clear_condition_is_checked() {
        let mut form = geo_form();
        form.select(&ty("country"), rec("us", "USA")).unwrap();

        let report = form.set_value(&ty("city"), rec("austin", "Austin")).unwrap();
        assert_eq!(report.cleared, 1);
        assert!(form.is_empty(&ty("city")));
        assert_eq!(form.update(UpdateEvent::settle()).unwrap().mutations(), 0);

        // Disabled fields still accept a pick, which is cleared right away.
        let report = form.select(&ty("city"), rec("austin", "Austin")).unwrap();
        assert_eq!(report.cleared, 1);
        assert!(form.is_empty(&ty("city")));
        assert_eq!(form.update(UpdateEvent::settle()).unwrap().mutations(), 0);
    }

    #[test]
    fn test_unregister_reevaluates() {
        let mut form = geo_form();
        form.select(&ty("country"), rec("us", "USA")).unwrap();
        form.select(&ty("state"), rec("tx", "Texas")).unwrap();

        let removed = form.unregister(&ty("country")).unwrap();
        assert_eq!(removed.id(), "us");

        // A missing field never activates but does not force clearing.
        assert!(!form.is_enabled(&ty("state")));
        assert_eq!(form.get_id(&ty("state")), "tx");
        assert!(form.is_enabled(&ty("city")));
        assert!(matches!(
            form.unregister(&ty("country")),
            Err(ComboError::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_registration_errors() {
        let mut form = geo_form();
        let err = form
            .register(ty("country"), FieldOptions::new(), MemoryWidget::new().boxed())
            .unwrap_err();
        assert!(matches!(err, ComboError::DuplicateFieldType(_)));

        let err = form
            .register(ty("zone"), FieldOptions::new(), MemoryWidget::new().boxed())
            .unwrap_err();
        assert!(matches!(err, ComboError::TypeNotFound(_)));
        assert_eq!(form.fields().len(), 3);
    }

    #[test]
    fn test_propagation_limit() {
        let flip = Arc::new(AtomicBool::new(false));
        let toggle = Arc::clone(&flip);
        let configs = vec![FieldConfig::new("odd", "odd")
            .with_active_when(Condition::custom(move |_| toggle.fetch_xor(true, Ordering::SeqCst)))];
        let mut form = ComboForm::new(registry(configs), Arc::new(NoLookup));

        let err = form
            .register(ty("odd"), FieldOptions::new(), MemoryWidget::new().boxed())
            .unwrap_err();

        match err {
            ComboError::PropagationLimit { passes, origin } => {
                assert_eq!(passes, EngineConfig::default().max_passes);
                assert_eq!(origin, Some(ty("odd")));
            }
            other => panic!("expected propagation limit, got {:?}", other),
        }
        assert!(!form.has_field(&ty("odd")));
    }

    #[test]
    fn test_readonly_field_is_toggled() {
        let mut form = ComboForm::new(registry(geo_configs()), Arc::new(NoLookup));
        form.register(ty("country"), FieldOptions::new(), MemoryWidget::new().boxed())
            .unwrap();
        form.register(ty("state"), FieldOptions::new(), MemoryWidget::readonly().boxed())
            .unwrap();

        assert!(form.field(&ty("state")).unwrap().is_readonly());
        assert!(!form.is_enabled(&ty("state")));
        form.select(&ty("country"), rec("us", "USA")).unwrap();
        assert!(form.is_enabled(&ty("state")));
    }

    #[test]
    fn test_custom_condition() {
        let configs = vec![
            FieldConfig::new("country", "country"),
            FieldConfig::new("zip", "zip").with_active_when(Condition::custom(|form| {
                form.text_of(&FieldType::new("country")) == "USA"
            })),
        ];
        let mut form = form_with(configs, Arc::new(NoLookup));
        assert!(!form.is_enabled(&ty("zip")));

        form.select(&ty("country"), rec("us", "USA")).unwrap();
        assert!(form.is_enabled(&ty("zip")));
        form.select(&ty("country"), rec("ca", "Canada")).unwrap();
        assert!(!form.is_enabled(&ty("zip")));
    }

    #[test]
    fn test_listeners_see_enable_and_update() {
        let mut form = geo_form();
        let enabled = Rc::new(Cell::new(0));
        let updates = Rc::new(Cell::new(0));

        let state = form.field_mut(&ty("state")).unwrap();
        let sink = Rc::clone(&enabled);
        state.on(FieldEventKind::Enabled, move |_| sink.set(sink.get() + 1));
        let sink = Rc::clone(&updates);
        state.on(FieldEventKind::Update, move |event| {
            if event.origin.is_some() {
                sink.set(sink.get() + 1)
            }
        });

        form.select(&ty("country"), rec("us", "USA")).unwrap();
        assert_eq!(enabled.get(), 1);
        assert_eq!(updates.get(), 1);
    }

    fn account_configs() -> Vec<FieldConfig> {
        vec![
            client_config(),
            FieldConfig::new("login", "hosting/account")
                .with_remote(RemoteQuery::new("/hosting/account/search").with_filter(
                    FilterSpec::new().with("client_id", FilterTerm::id_of("client/client")),
                ))
                .with_affects("client/client", AffectRule::Convention("client".into())),
        ]
    }

    fn account_record() -> RemoteRecord {
        json!({"id": 1, "text": "root", "client_id": 7, "client": "Acme"})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_affects_copies_selected_record() {
        let mut form = form_with(account_configs(), Arc::new(NoLookup));

        let report = form.select_remote(&ty("hosting/account"), &account_record()).unwrap();

        assert_eq!(report.propagated, 1);
        assert_eq!(form.get_data(&ty("client/client")), Some(&rec("7", "Acme")));
        assert_eq!(form.pending_count(), 0);
    }

    #[test]
    fn test_propagated_value_does_not_propagate_again() {
        let keys = |name: &str| {
            AffectRule::Keys(AffectKeys {
                id: Some(format!("{}_id", name)),
                value: name.to_string(),
            })
        };
        let configs = vec![
            FieldConfig::new("a", "a").with_affects("b", keys("b")),
            FieldConfig::new("b", "b")
                .with_data(vec![Record::new("2", "B")
                    .with_attribute("c_id", "3")
                    .with_attribute("c", "C")])
                .with_affects("c", keys("c")),
            FieldConfig::new("c", "c"),
        ];
        let mut form = form_with(configs, Arc::new(NoLookup));
        let picked = Record::new("1", "A")
            .with_attribute("b_id", "2")
            .with_attribute("b", "B")
            .with_attribute("c_id", "3")
            .with_attribute("c", "C");

        let report = form.select(&ty("a"), FieldValue::single(picked)).unwrap();

        assert_eq!(report.propagated, 1);
        assert_eq!(form.get_id(&ty("b")), "2");
        assert_eq!(form.field(&ty("b")).unwrap().value().records()[0].get_string("c_id").as_deref(), Some("3"));
        assert!(form.is_empty(&ty("c")));
    }

    #[test]
    fn test_programmatic_set_does_not_propagate() {
        let mut form = form_with(account_configs(), Arc::new(NoLookup));
        let value = FieldValue::single(
            Record::new("2", "admin")
                .with_attribute("client_id", 9)
                .with_attribute("client", "Globex"),
        );

        let report = form.set_value(&ty("hosting/account"), value).unwrap();

        assert_eq!(report.propagated, 0);
        assert!(form.is_empty(&ty("client/client")));
    }

    #[test]
    fn test_affects_skips_record_without_keys() {
        let mut form = form_with(account_configs(), Arc::new(NoLookup));
        let record = json!({"id": 3, "text": "orphan"}).as_object().unwrap().clone();

        let report = form.select_remote(&ty("hosting/account"), &record).unwrap();

        assert_eq!(report.propagated, 0);
        assert!(form.is_empty(&ty("client/client")));
    }

    #[tokio::test]
    async fn test_search_uses_form_filters() {
        let lookup = Arc::new(StaticLookup::new().with_json_table(
            "/hosting/account/search",
            json!([
                {"id": 1, "login": "root", "client_id": 7},
                {"id": 2, "login": "admin", "client_id": 7},
                {"id": 3, "login": "rooster", "client_id": 9}
            ]),
        ));
        let mut form = form_with(account_configs(), lookup.clone());
        form.set_value(&ty("client/client"), rec("7", "Acme")).unwrap();

        let found = form.search(&ty("hosting/account"), "roo").await.unwrap();

        assert_eq!(found, vec![Record::new("1", "root")]);
        let request = &lookup.requests()[0];
        assert_eq!(request.param("client_id"), Some(&json!("7")));
        assert_eq!(request.param("login_like"), Some(&json!("roo")));
    }

    #[tokio::test]
    async fn test_initial_value_resolved_remotely() {
        let lookup = client_lookup();
        let mut form = ComboForm::new(registry(vec![client_config()]), lookup.clone());
        form.register(
            ty("client/client"),
            FieldOptions::new().with_value("7"),
            MemoryWidget::new().boxed(),
        )
        .unwrap();

        assert!(form.field(&ty("client/client")).unwrap().is_busy());
        assert_eq!(form.get_data(&ty("client/client")), Some(&rec("7", "7")));
        let err = form.select(&ty("client/client"), rec("9", "Globex")).unwrap_err();
        assert!(matches!(err, ComboError::FieldBusy(_)));

        assert_eq!(form.resolve_pending().await.unwrap(), 1);

        assert!(!form.field(&ty("client/client")).unwrap().is_busy());
        assert_eq!(form.get_text(&ty("client/client")), "Acme");
        assert_eq!(
            serde_json::to_value(&lookup.requests()[0].body).unwrap(),
            json!({"return": ["id"], "rename": {"text": "client"}, "id": "7"})
        );
    }

    #[tokio::test]
    async fn test_unmatched_id_keeps_own_text() {
        let mut form = ComboForm::new(registry(vec![client_config()]), client_lookup());
        form.register(
            ty("client/client"),
            FieldOptions::new().with_value("42"),
            MemoryWidget::new().boxed(),
        )
        .unwrap();

        form.resolve_pending().await.unwrap();
        assert_eq!(form.get_data(&ty("client/client")), Some(&rec("42", "42")));
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_placeholder() {
        let lookup = client_lookup();
        lookup.fail("/client/search");
        let mut form = ComboForm::new(registry(vec![client_config()]), lookup.clone());
        form.register(
            ty("client/client"),
            FieldOptions::new().with_value("7"),
            MemoryWidget::new().boxed(),
        )
        .unwrap();

        let err = form.resolve_pending().await.unwrap_err();

        assert!(matches!(err, ComboError::Transport(_)));
        assert_eq!(form.get_data(&ty("client/client")), Some(&rec("7", "7")));
        assert!(!form.field(&ty("client/client")).unwrap().is_busy());
    }

    #[tokio::test]
    async fn test_late_lookup_after_unregister_is_discarded() {
        let mut form = ComboForm::new(registry(vec![client_config()]), client_lookup());
        form.register(
            ty("client/client"),
            FieldOptions::new().with_value("7"),
            MemoryWidget::new().boxed(),
        )
        .unwrap();
        let pending = form.take_pending();
        form.unregister(&ty("client/client")).unwrap();

        for lookup in pending {
            let outcome = lookup.wait().await;
            assert!(!form.apply_lookup(outcome).unwrap());
        }
    }

    #[tokio::test]
    async fn test_superseded_lookup_is_discarded() {
        let mut form = ComboForm::new(registry(vec![client_config()]), client_lookup());
        form.register(
            ty("client/client"),
            FieldOptions::new().with_value("7"),
            MemoryWidget::new().boxed(),
        )
        .unwrap();
        let pending = form.take_pending();

        form.set_value(&ty("client/client"), rec("9", "Globex")).unwrap();

        for lookup in pending {
            let outcome = lookup.wait().await;
            assert!(!form.apply_lookup(outcome).unwrap());
        }
        assert_eq!(form.get_text(&ty("client/client")), "Globex");
    }

    #[tokio::test]
    async fn test_init_text_is_single_use() {
        let lookup = client_lookup();
        let mut form = ComboForm::new(registry(vec![client_config()]), lookup.clone());
        form.register(
            ty("client/client"),
            FieldOptions::new().with_value("7").with_init_text("Acme Corp"),
            MemoryWidget::new().boxed(),
        )
        .unwrap();

        assert_eq!(form.pending_count(), 0);
        assert_eq!(form.get_text(&ty("client/client")), "Acme Corp");

        form.set_data(&ty("client/client"), Some("9"), None).unwrap();
        assert_eq!(form.pending_count(), 1);
        form.resolve_pending().await.unwrap();
        assert_eq!(form.get_text(&ty("client/client")), "Globex");
        assert_eq!(lookup.request_count(), 1);
    }

    #[test]
    fn test_multiple_field_from_table() {
        let configs = vec![FieldConfig::new("tag", "tag").with_multiple(true).with_data(vec![
            Record::new("1", "a"),
            Record::new("2", "b"),
            Record::new("3", "c"),
        ])];
        let mut form = ComboForm::new(registry(configs), Arc::new(NoLookup));
        form.register(
            ty("tag"),
            FieldOptions::new().with_value("1,,2"),
            MemoryWidget::new().boxed(),
        )
        .unwrap();
        assert_eq!(form.get_text(&ty("tag")), "a,b");

        let picked = json!({"id": 3, "text": "c"}).as_object().unwrap().clone();
        form.select_remote(&ty("tag"), &picked).unwrap();
        assert_eq!(form.get_id(&ty("tag")), "1,2,3");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const TYPES: [&str; 3] = ["country", "state", "city"];

        proptest! {
            #[test]
            fn user_edits_always_settle(ops in proptest::collection::vec((0usize..3, 0u8..3), 1..24)) {
                let mut form = geo_form();

                for (field, choice) in ops {
                    let field_type = ty(TYPES[field]);
                    if !form.is_enabled(&field_type) {
                        continue;
                    }
                    if choice == 0 {
                        form.clear(&field_type).unwrap();
                    } else {
                        let id = format!("{}{}", TYPES[field], choice);
                        form.select(&field_type, rec(&id, &id)).unwrap();
                    }

                    prop_assert_eq!(form.is_enabled(&ty("state")), form.is_set(&ty("country")));
                    prop_assert_eq!(form.is_enabled(&ty("city")), form.is_set(&ty("state")));
                    if !form.is_set(&ty("country")) {
                        prop_assert!(form.is_empty(&ty("state")));
                    }
                    prop_assert_eq!(form.update(UpdateEvent::settle()).unwrap().mutations(), 0);
                }
            }
        }
    }
}
