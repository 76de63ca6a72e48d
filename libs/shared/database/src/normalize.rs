//! Legacy row migration.
//!
//! Older records were written with camelCase keys, Mongo-style ids and several
//! synonyms for the same intake field. Rows are rewritten onto the canonical
//! field names here, once, before they are deserialized, so nothing past the
//! store has to look at alternative names.

use chrono::{TimeZone, Utc};
use serde_json::{Map, Value};

use shared_models::intake::IntakeForm;

const PROVIDER_ALIASES: &[(&str, &str)] = &[
    ("_id", "id"),
    ("fees", "fee"),
    ("specialty", "speciality"),
    ("slots_booked", "booked_slots"),
    ("slotsBooked", "booked_slots"),
    ("bookedSlots", "booked_slots"),
    ("createdAt", "created_at"),
];

const APPOINTMENT_ALIASES: &[(&str, &str)] = &[
    ("_id", "id"),
    ("userId", "patient_id"),
    ("docIds", "provider_ids"),
    ("docId", "provider_ids"),
    ("slotDate", "slot_date"),
    ("slotTime", "slot_time"),
    ("userData", "patient_snapshot"),
    ("docData", "provider_snapshots"),
    ("mriFormData", "intake_form"),
    ("formData", "intake_form"),
    ("payment", "paid"),
    ("isCompleted", "completed"),
    ("stripeSessionId", "payment_session_id"),
    ("paymentIntentId", "payment_intent_id"),
    ("paymentAmount", "paid_amount"),
    ("paymentCurrency", "paid_currency"),
    ("paymentDate", "paid_at"),
    ("refundId", "refund_id"),
    ("cancelledAt", "cancelled_at"),
    ("createdAt", "created_at"),
];

const INTAKE_ALIASES: &[(&str, &str)] = &[
    ("lastName", "surname"),
    ("patientName", "first_name"),
    ("streetAddress", "street"),
    ("address", "street"),
    ("apartment", "apt_number"),
    ("unit", "apt_number"),
    ("zipCode", "postal_code"),
    ("homePhone", "phone_home"),
    ("workPhone", "phone_work"),
    ("dateOfBirth", "dob"),
    ("bodyPart", "area_to_be_examined"),
    ("symptoms", "clinical_information"),
    ("diagnosis", "working_diagnosis"),
    ("physicianName", "referring_physician_name"),
    ("referringPhysician", "referring_physician_name"),
    ("physicianClinic", "referring_physician_address"),
    ("clinic", "referring_physician_address"),
    ("hospital", "referring_physician_address"),
    ("physicianPostalCode", "referring_physician_postal_code"),
    ("physicianPhone", "referring_physician_phone"),
    ("physicianContact", "referring_physician_phone"),
    ("physicianFax", "referring_physician_fax"),
    ("previousMRI", "mri"),
    ("previousCT", "ct_angio"),
    ("previousXRay", "xray"),
    ("previousUS", "us"),
    ("screeningQuestions", "screening"),
    ("examAreaSelections", "exam_areas"),
];

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Moves aliased keys onto their canonical name. A canonical key that is
/// already present wins over any alias, and the first alias found wins over
/// later ones.
fn apply_aliases(row: &mut Map<String, Value>, aliases: &[(&str, &str)]) {
    for (legacy, canonical) in aliases {
        if let Some(value) = row.remove(*legacy) {
            if !row.contains_key(*canonical) && !is_blank(&value) {
                row.insert(canonical.to_string(), value);
            }
        }
    }
}

fn snake_case_keys(row: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(row.len());
    for (key, value) in row {
        let key = camel_to_snake(&key);
        out.entry(key).or_insert(value);
    }
    out
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Millisecond epoch numbers become RFC 3339 timestamps.
fn epoch_millis_to_timestamp(row: &mut Map<String, Value>, legacy: &str, canonical: &str) {
    if let Some(value) = row.remove(legacy) {
        if row.contains_key(canonical) {
            return;
        }
        let converted = match value.as_i64() {
            Some(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .map(|t| Value::String(t.to_rfc3339())),
            None => Some(value),
        };
        if let Some(v) = converted {
            row.insert(canonical.to_string(), v);
        }
    }
}

/// `{line1, line2}` address objects collapse to a single line.
fn flatten_address(value: Value) -> Value {
    match value {
        Value::Object(parts) => {
            let lines: Vec<&str> = ["line1", "line2"]
                .iter()
                .filter_map(|k| parts.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if lines.is_empty() {
                Value::Null
            } else {
                Value::String(lines.join(", "))
            }
        }
        other => other,
    }
}

fn parse_number(value: Value) -> Value {
    let parsed = value
        .as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .and_then(serde_json::Number::from_f64);
    match parsed {
        Some(n) => Value::Number(n),
        None => value,
    }
}

pub fn normalize_provider_row(row: Value) -> Value {
    let Value::Object(mut row) = row else {
        return row;
    };
    apply_aliases(&mut row, PROVIDER_ALIASES);
    epoch_millis_to_timestamp(&mut row, "date", "created_at");

    if let Some(fee) = row.remove("fee") {
        row.insert("fee".to_string(), parse_number(fee));
    }
    if let Some(address) = row.remove("address") {
        row.insert("address".to_string(), flatten_address(address));
    }
    row.remove("password");
    row.remove("__v");

    Value::Object(row)
}

fn normalize_provider_snapshot(row: Value) -> Value {
    let Value::Object(mut row) = normalize_provider_row(row) else {
        return Value::Null;
    };
    row.remove("booked_slots");
    row.remove("available");
    row.remove("about");
    row.remove("created_at");
    Value::Object(row)
}

fn normalize_patient_snapshot(row: Value) -> Value {
    let Value::Object(mut row) = row else {
        return row;
    };
    apply_aliases(&mut row, &[("_id", "id")]);
    // Snapshots only carry the contact essentials.
    row.retain(|k, _| matches!(k.as_str(), "id" | "name" | "email" | "phone" | "dob" | "gender"));
    Value::Object(row)
}

pub fn normalize_patient_row(row: Value) -> Value {
    let Value::Object(mut row) = row else {
        return row;
    };
    apply_aliases(&mut row, &[("_id", "id"), ("createdAt", "created_at"), ("updatedAt", "updated_at")]);
    if let Some(address) = row.remove("address") {
        row.insert("address".to_string(), flatten_address(address));
    }
    row.remove("password");
    row.remove("image");
    row.remove("__v");
    Value::Object(row)
}

pub fn normalize_appointment_row(row: Value) -> Value {
    let Value::Object(mut row) = row else {
        return row;
    };
    apply_aliases(&mut row, APPOINTMENT_ALIASES);
    epoch_millis_to_timestamp(&mut row, "date", "created_at");
    row.remove("__v");

    // A single provider id becomes a one-element list.
    if let Some(ids) = row.remove("provider_ids") {
        let ids = match ids {
            Value::Array(_) => ids,
            single => Value::Array(vec![single]),
        };
        row.insert("provider_ids".to_string(), ids);
    }

    if let Some(snapshots) = row.remove("provider_snapshots") {
        let list = match snapshots {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            single => vec![single],
        };
        let list = list.into_iter().map(normalize_provider_snapshot).collect();
        row.insert("provider_snapshots".to_string(), Value::Array(list));
    }

    if let Some(patient) = row.remove("patient_snapshot") {
        row.insert("patient_snapshot".to_string(), normalize_patient_snapshot(patient));
    }

    if let Some(amount) = row.remove("amount") {
        row.insert("amount".to_string(), parse_number(amount));
    }

    if let Some(form) = row.remove("intake_form") {
        row.insert("intake_form".to_string(), normalize_intake(form));
    }

    Value::Object(row)
}

fn normalize_screening_answer(value: Value) -> Value {
    match value {
        Value::Bool(true) => Value::String("yes".to_string()),
        Value::Bool(false) => Value::String("no".to_string()),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Value::String("yes".to_string()),
            "no" | "n" => Value::String("no".to_string()),
            _ => Value::String("unknown".to_string()),
        },
        _ => Value::String("unknown".to_string()),
    }
}

fn normalize_flag(value: Value) -> Value {
    match value {
        Value::Bool(_) => value,
        Value::String(s) => Value::Bool(matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "yes" | "true" | "y"
        )),
        _ => Value::Bool(false),
    }
}

fn empty_to_null(value: Value) -> Value {
    if is_blank(&value) {
        Value::Null
    } else {
        value
    }
}

fn keep_known_keys(section: Map<String, Value>, template: &Value) -> Map<String, Value> {
    let Some(known) = template.as_object() else {
        return section;
    };
    section.into_iter().filter(|(k, _)| known.contains_key(k)).collect()
}

/// Rewrites a stored intake payload onto the canonical [`IntakeForm`] keys.
/// Keys the form does not know are dropped so the strict deserializer accepts
/// old payloads.
pub fn normalize_intake(form: Value) -> Value {
    let Value::Object(mut form) = form else {
        return Value::Object(Map::new());
    };
    apply_aliases(&mut form, INTAKE_ALIASES);
    let form = snake_case_keys(form);

    let template = serde_json::to_value(IntakeForm::default()).unwrap_or(Value::Null);
    let mut form = keep_known_keys(form, &template);

    if let Some(Value::Object(screening)) = form.remove("screening") {
        let screening = snake_case_keys(screening)
            .into_iter()
            .map(|(k, v)| (k, normalize_screening_answer(v)))
            .collect();
        let screening = keep_known_keys(screening, &template["screening"]);
        form.insert("screening".to_string(), Value::Object(screening));
    }

    if let Some(Value::Object(areas)) = form.remove("exam_areas") {
        let areas = snake_case_keys(areas)
            .into_iter()
            .map(|(k, v)| (k, normalize_flag(v)))
            .collect();
        let areas = keep_known_keys(areas, &template["exam_areas"]);
        form.insert("exam_areas".to_string(), Value::Object(areas));
    }

    for choice in ["sex", "priority", "redirect_to"] {
        if let Some(value) = form.remove(choice) {
            form.insert(choice.to_string(), empty_to_null(value));
        }
    }

    if let Some(value) = form.remove("is_wsib_claim") {
        let value = if is_blank(&value) { Value::Null } else { normalize_flag(value) };
        form.insert("is_wsib_claim".to_string(), value);
    }

    // Remaining text fields may have been stored as numbers.
    for (_, value) in form.iter_mut() {
        if let Value::Number(n) = value {
            *value = Value::String(n.to_string());
        }
    }
    for key in ["sex", "priority", "redirect_to", "is_wsib_claim"] {
        if form.get(key).map_or(false, Value::is_null) {
            form.remove(key);
        }
    }

    Value::Object(form)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use shared_models::appointment::Appointment;
    use shared_models::intake::{ScreeningAnswer, Sex};
    use shared_models::provider::Provider;

    use super::*;

    #[test]
    fn legacy_provider_row_deserializes() {
        let row = json!({
            "_id": "5b1c7a4e-2f7f-4c7e-9a57-1b2f5d1b7c10",
            "name": "Dr. A",
            "speciality": "Neuro MRI",
            "fees": "100",
            "available": true,
            "image": "https://cdn.example.com/a.png",
            "address": { "line1": "1 Main St", "line2": "Suite 4" },
            "slots_booked": { "12/3/2025": ["10:00 AM"] },
            "date": 1735689600000i64,
            "password": "hash"
        });

        let provider: Provider = serde_json::from_value(normalize_provider_row(row)).unwrap();
        assert_eq!(provider.fee, 100.0);
        assert_eq!(provider.address.as_deref(), Some("1 Main St, Suite 4"));
        assert!(provider.booked_slots.is_booked("12/3/2025", "10:00 AM"));
    }

    #[test]
    fn legacy_appointment_row_deserializes() {
        let doc_id = "5b1c7a4e-2f7f-4c7e-9a57-1b2f5d1b7c10";
        let row = json!({
            "_id": "0e0f7c1d-3f0e-4b8f-8f1c-6a1b2c3d4e5f",
            "userId": "patient-1",
            "docId": doc_id,
            "slotDate": "12/3/2025",
            "slotTime": "10:00 AM",
            "userData": { "_id": "patient-1", "name": "Min Lee", "password": "x" },
            "docData": { "_id": doc_id, "name": "Dr. A", "speciality": "MRI", "fees": 100 },
            "amount": 100,
            "date": 1735689600000i64,
            "payment": true,
            "isCompleted": false,
            "cancelled": false,
            "stripeSessionId": "cs_test_1",
            "mriFormData": {
                "lastName": "Lee",
                "firstName": "Min",
                "dateOfBirth": "1/1/1990",
                "healthCardNumber": 1234567890,
                "symptoms": "headache",
                "sex": "F",
                "isWsibClaim": "NO",
                "priority": "",
                "physicianClinic": "Lakeshore Clinic",
                "screeningQuestions": { "pregnancy": "NO", "cardiacPacemaker": "YES", "metalGrinder": "" },
                "examAreaSelections": { "head": true },
                "uploadedPdf": "ref.pdf"
            }
        });

        let appt: Appointment = serde_json::from_value(normalize_appointment_row(row)).unwrap();
        assert!(appt.paid);
        assert_eq!(appt.provider_ids.len(), 1);
        assert_eq!(appt.payment_session_id.as_deref(), Some("cs_test_1"));
        assert_eq!(appt.provider_snapshots[0].fee, 100.0);

        let form = appt.intake_form;
        assert_eq!(form.surname, "Lee");
        assert_eq!(form.first_name, "Min");
        assert_eq!(form.health_card_number, "1234567890");
        assert_eq!(form.clinical_information, "headache");
        assert_eq!(form.sex, Some(Sex::Female));
        assert_eq!(form.is_wsib_claim, Some(false));
        assert_eq!(form.priority, None);
        assert_eq!(form.referring_physician_address, "Lakeshore Clinic");
        assert_eq!(form.screening.cardiac_pacemaker, ScreeningAnswer::Yes);
        assert_eq!(form.screening.metal_grinder, ScreeningAnswer::Unknown);
        assert!(form.exam_areas.head);
    }

    #[test]
    fn canonical_value_wins_over_synonym() {
        let form = normalize_intake(json!({ "street": "2 King St", "streetAddress": "old" }));
        assert_eq!(form["street"], json!("2 King St"));
    }

    #[test]
    fn canonical_rows_pass_through() {
        let form = IntakeForm::default();
        let value = serde_json::to_value(&form).unwrap();
        let back: IntakeForm = serde_json::from_value(normalize_intake(value)).unwrap();
        assert_eq!(back, form);
    }
}
