use crate::domain::{EntityFactory, LineSequencer};
use chrono::{DateTime, Utc};
use common::{
    FieldValue, HeaderRecord, InterfaceConfig, LineRecord, MappingRule, PipelineError,
    PipelineResult, RuleLevel, XmlDocument,
};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Reserved line-level target field: when a mapping rule supplies it, the
/// coerced integer replaces the factory-assigned sequence number.
const LINE_NUMBER_FIELD: &str = "line_number";

/// Applies an interface's ordered rule set to a parsed document, producing
/// one header and its lines on top of entity factory defaults.
///
/// Rules run in ascending priority order and the first valid match wins per
/// target field; later duplicates are ignored. Unresolved optional rules
/// leave the factory default untouched. The transform is a pure function of
/// its inputs, so reprocessing a redelivered envelope yields identical
/// records.
pub struct MappingEngine;

impl MappingEngine {
    #[instrument(skip_all, fields(interface_id = %interface.interface_id, tenant_id = %tenant_id, rule_count = rules.len()))]
    pub fn transform(
        interface: &InterfaceConfig,
        rules: &[MappingRule],
        document: &XmlDocument,
        tenant_id: &str,
        received_at: DateTime<Utc>,
    ) -> PipelineResult<(HeaderRecord, Vec<LineRecord>)> {
        let mut ordered: Vec<&MappingRule> = rules.iter().filter(|rule| rule.active).collect();
        ordered.sort_by_key(|rule| rule.priority);

        let header_rules: Vec<&MappingRule> = ordered
            .iter()
            .copied()
            .filter(|rule| rule.level == RuleLevel::Header)
            .collect();
        let line_rules: Vec<&MappingRule> = ordered
            .iter()
            .copied()
            .filter(|rule| rule.level == RuleLevel::Line)
            .collect();

        let mut header =
            EntityFactory::new_header(tenant_id, interface.document_type, received_at);
        let mut mapped_fields = BTreeSet::new();
        for rule in &header_rules {
            if let Some(value) = resolve_rule(rule, |path| document.first_text(path))? {
                assign(&mut header.fields, &mut mapped_fields, &rule.target_field, value);
            }
        }

        let mut sequencer = LineSequencer::new();
        let mut lines = Vec::new();
        for element in document.select_all(&interface.line_path) {
            let mut line = EntityFactory::new_line(&header, &mut sequencer, received_at);
            let mut mapped_fields = BTreeSet::new();
            for rule in &line_rules {
                if let Some(value) = resolve_rule(rule, |path| element.first_text(path))? {
                    assign(&mut line.fields, &mut mapped_fields, &rule.target_field, value);
                }
            }
            apply_line_number_override(&mut line);
            lines.push(line);
        }

        // A document with no line matches still gets one factory-default
        // line when the interface requires at least one.
        if lines.is_empty() && interface.requires_line {
            debug!("no line matches, synthesizing default line");
            lines.push(EntityFactory::new_line(
                &header,
                &mut sequencer,
                received_at,
            ));
        }

        debug!(line_count = lines.len(), "transformed document");
        Ok((header, lines))
    }
}

/// Resolve one rule against the document: found values are transformed and
/// coerced; missing values fall back to the default; a missing required
/// value with no default is a validation error naming the target field.
fn resolve_rule(
    rule: &MappingRule,
    lookup: impl Fn(&str) -> Option<String>,
) -> PipelineResult<Option<FieldValue>> {
    match lookup(&rule.source_path) {
        Some(raw) => {
            let raw = match rule.transformation {
                Some(transformation) => transformation.apply(&raw),
                None => raw,
            };
            let value = rule.data_type.coerce(&raw).map_err(|message| {
                PipelineError::Validation(format!(
                    "rule for '{}': {}",
                    rule.target_field, message
                ))
            })?;
            Ok(Some(value))
        }
        None => match &rule.default_value {
            Some(default) => {
                let value = rule.data_type.coerce(default).map_err(|message| {
                    PipelineError::Validation(format!(
                        "default for '{}': {}",
                        rule.target_field, message
                    ))
                })?;
                Ok(Some(value))
            }
            None if rule.required => Err(PipelineError::RequiredRuleUnmatched(
                rule.target_field.clone(),
            )),
            None => Ok(None),
        },
    }
}

/// Rule values overwrite factory defaults, but only the first rule to
/// resolve a target field wins; later duplicates are ignored.
fn assign(
    fields: &mut std::collections::BTreeMap<String, FieldValue>,
    mapped: &mut BTreeSet<String>,
    target_field: &str,
    value: FieldValue,
) {
    if mapped.contains(target_field) {
        return;
    }
    fields.insert(target_field.to_string(), value);
    mapped.insert(target_field.to_string());
}

fn apply_line_number_override(line: &mut LineRecord) {
    let number = match line.get(LINE_NUMBER_FIELD) {
        Some(FieldValue::Integer(number)) => Some(*number),
        _ => None,
    };
    if let Some(number) = number {
        if number > 0 {
            line.sequence = number as u32;
        }
        line.fields.remove(LINE_NUMBER_FIELD);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{DocumentType, RuleDataType, RuleTransformation};

    const SHIPMENT: &str = r#"<ShipmentNotice>
  <Header>
    <OrderNumber> PO-42 </OrderNumber>
    <Status>shipped</Status>
    <AltStatus>staged</AltStatus>
    <ShipDate>2024-11-05</ShipDate>
  </Header>
  <Lines>
    <Line>
      <Sku>WIDGET-1</Sku>
      <Quantity>3</Quantity>
    </Line>
    <Line>
      <Sku>WIDGET-2</Sku>
      <Quantity>7</Quantity>
    </Line>
  </Lines>
</ShipmentNotice>"#;

    fn interface() -> InterfaceConfig {
        InterfaceConfig {
            interface_id: "7".to_string(),
            tenant_id: "3".to_string(),
            document_type: DocumentType::ShipmentNotice,
            line_path: "Lines/Line".to_string(),
            requires_line: true,
            high_priority: false,
            bulk: false,
            active: true,
        }
    }

    fn rule(
        source_path: &str,
        target_field: &str,
        level: RuleLevel,
        data_type: RuleDataType,
        priority: i32,
    ) -> MappingRule {
        MappingRule {
            interface_id: "7".to_string(),
            source_path: source_path.to_string(),
            target_field: target_field.to_string(),
            level,
            data_type,
            required: false,
            default_value: None,
            transformation: None,
            priority,
            active: true,
        }
    }

    fn received_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-11-05T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_header_and_lines_are_mapped() {
        let document = XmlDocument::parse(SHIPMENT.as_bytes()).unwrap();
        let rules = vec![
            rule(
                "Header/OrderNumber",
                "order_number",
                RuleLevel::Header,
                RuleDataType::Text,
                1,
            ),
            rule(
                "Header/ShipDate",
                "ship_date",
                RuleLevel::Header,
                RuleDataType::Date,
                2,
            ),
            rule("Sku", "sku", RuleLevel::Line, RuleDataType::Text, 3),
            rule(
                "Quantity",
                "quantity_shipped",
                RuleLevel::Line,
                RuleDataType::Integer,
                4,
            ),
        ];

        let (header, lines) =
            MappingEngine::transform(&interface(), &rules, &document, "3", received_at()).unwrap();

        assert_eq!(
            header.get("order_number"),
            Some(&FieldValue::Text("PO-42".to_string()))
        );
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].sequence, 1);
        assert_eq!(lines[1].sequence, 2);
        assert_eq!(
            lines[0].get("sku"),
            Some(&FieldValue::Text("WIDGET-1".to_string()))
        );
        assert_eq!(lines[1].get("quantity_shipped"), Some(&FieldValue::Integer(7)));
    }

    #[test]
    fn test_lowest_priority_rule_wins_per_target_field() {
        let document = XmlDocument::parse(SHIPMENT.as_bytes()).unwrap();
        let mut first = rule(
            "Header/Status",
            "status",
            RuleLevel::Header,
            RuleDataType::Text,
            1,
        );
        first.transformation = Some(RuleTransformation::Uppercase);
        let second = rule(
            "Header/AltStatus",
            "status",
            RuleLevel::Header,
            RuleDataType::Text,
            2,
        );

        // Deliberately out of order; the engine sorts by priority.
        let (header, _) = MappingEngine::transform(
            &interface(),
            &[second, first],
            &document,
            "3",
            received_at(),
        )
        .unwrap();

        assert_eq!(
            header.get("status"),
            Some(&FieldValue::Text("SHIPPED".to_string()))
        );
    }

    #[test]
    fn test_missing_required_rule_names_the_target_field() {
        let document = XmlDocument::parse(SHIPMENT.as_bytes()).unwrap();
        let mut required = rule(
            "Header/CarrierCode",
            "carrier_code",
            RuleLevel::Header,
            RuleDataType::Text,
            1,
        );
        required.required = true;

        let result =
            MappingEngine::transform(&interface(), &[required], &document, "3", received_at());

        assert!(matches!(
            result,
            Err(PipelineError::RequiredRuleUnmatched(field)) if field == "carrier_code"
        ));
    }

    #[test]
    fn test_missing_value_with_default_uses_the_default() {
        let document = XmlDocument::parse(SHIPMENT.as_bytes()).unwrap();
        let mut defaulted = rule(
            "Header/CarrierCode",
            "carrier_code",
            RuleLevel::Header,
            RuleDataType::Text,
            1,
        );
        defaulted.required = true;
        defaulted.default_value = Some("UNKNOWN".to_string());

        let (header, _) =
            MappingEngine::transform(&interface(), &[defaulted], &document, "3", received_at())
                .unwrap();

        assert_eq!(
            header.get("carrier_code"),
            Some(&FieldValue::Text("UNKNOWN".to_string()))
        );
    }

    #[test]
    fn test_unresolved_optional_rule_keeps_factory_default() {
        let document = XmlDocument::parse(SHIPMENT.as_bytes()).unwrap();
        let optional = rule(
            "Header/PackageCount",
            "package_count",
            RuleLevel::Header,
            RuleDataType::Integer,
            1,
        );

        let (header, _) =
            MappingEngine::transform(&interface(), &[optional], &document, "3", received_at())
                .unwrap();

        assert_eq!(header.get("package_count"), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn test_zero_line_matches_synthesizes_one_default_line() {
        let document =
            XmlDocument::parse(b"<ShipmentNotice><Header/></ShipmentNotice>").unwrap();

        let (_, lines) =
            MappingEngine::transform(&interface(), &[], &document, "3", received_at()).unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].sequence, 1);
        assert_eq!(lines[0].get("quantity_shipped"), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn test_zero_line_matches_without_requirement_yields_no_lines() {
        let document =
            XmlDocument::parse(b"<ShipmentNotice><Header/></ShipmentNotice>").unwrap();
        let mut config = interface();
        config.requires_line = false;

        let (_, lines) =
            MappingEngine::transform(&config, &[], &document, "3", received_at()).unwrap();

        assert!(lines.is_empty());
    }

    #[test]
    fn test_mapped_line_number_overrides_sequence() {
        let document = XmlDocument::parse(SHIPMENT.as_bytes()).unwrap();
        let line_number = rule(
            "Quantity",
            "line_number",
            RuleLevel::Line,
            RuleDataType::Integer,
            1,
        );

        let (_, lines) = MappingEngine::transform(
            &interface(),
            &[line_number],
            &document,
            "3",
            received_at(),
        )
        .unwrap();

        assert_eq!(lines[0].sequence, 3);
        assert_eq!(lines[1].sequence, 7);
        assert!(lines[0].get("line_number").is_none());
    }

    #[test]
    fn test_coercion_failure_is_a_validation_error_naming_the_rule() {
        let document = XmlDocument::parse(SHIPMENT.as_bytes()).unwrap();
        let bad = rule(
            "Header/OrderNumber",
            "package_count",
            RuleLevel::Header,
            RuleDataType::Integer,
            1,
        );

        let result = MappingEngine::transform(&interface(), &[bad], &document, "3", received_at());

        assert!(matches!(
            result,
            Err(PipelineError::Validation(msg)) if msg.contains("package_count")
        ));
    }

    #[test]
    fn test_transform_is_idempotent() {
        let document = XmlDocument::parse(SHIPMENT.as_bytes()).unwrap();
        let rules = vec![
            rule(
                "Header/OrderNumber",
                "order_number",
                RuleLevel::Header,
                RuleDataType::Text,
                1,
            ),
            rule("Sku", "sku", RuleLevel::Line, RuleDataType::Text, 2),
        ];

        let first =
            MappingEngine::transform(&interface(), &rules, &document, "3", received_at()).unwrap();
        let second =
            MappingEngine::transform(&interface(), &rules, &document, "3", received_at()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_inactive_rules_are_skipped() {
        let document = XmlDocument::parse(SHIPMENT.as_bytes()).unwrap();
        let mut inactive = rule(
            "Header/Status",
            "status",
            RuleLevel::Header,
            RuleDataType::Text,
            1,
        );
        inactive.active = false;

        let (header, _) =
            MappingEngine::transform(&interface(), &[inactive], &document, "3", received_at())
                .unwrap();

        // Factory default survives because the only mapping rule is inactive
        assert_eq!(
            header.get("status"),
            Some(&FieldValue::Text("RECEIVED".to_string()))
        );
    }
}
