//! MRI referral intake form.
//!
//! The form is edited field by field through [`IntakeForm::update`] using
//! dotted paths (`surname`, `screening.pregnancy`, `exam_areas.head`) and must
//! pass [`IntakeForm::validate_for_submission`] before a booking can be
//! confirmed. The validated form is stored on the appointment verbatim.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Unknown intake section: {0}")]
    UnknownSection(String),

    #[error("Unknown intake field: {0}")]
    UnknownField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Every required field that is blank, in form order.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Missing required intake fields: {}", .missing.join(", "))]
pub struct ValidationError {
    pub missing: Vec<String>,
}

// ==============================================================================
// SINGLE-CHOICE GROUPS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "URGENT (WITHIN 1 WK)")]
    Urgent,
    #[serde(rename = "SEMI-URGENT (2-8 WKS)")]
    SemiUrgent,
    #[serde(rename = "INPATIENT")]
    Inpatient,
    #[serde(rename = "ELECTIVE")]
    Elective,
    #[serde(rename = "NON-RES")]
    NonResident,
    #[serde(rename = "DIALYSIS PATIENT")]
    Dialysis,
}

impl Priority {
    pub const ALL: [Priority; 6] = [
        Priority::Urgent,
        Priority::SemiUrgent,
        Priority::Inpatient,
        Priority::Elective,
        Priority::NonResident,
        Priority::Dialysis,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Urgent => "URGENT (WITHIN 1 WK)",
            Priority::SemiUrgent => "SEMI-URGENT (2-8 WKS)",
            Priority::Inpatient => "INPATIENT",
            Priority::Elective => "ELECTIVE",
            Priority::NonResident => "NON-RES",
            Priority::Dialysis => "DIALYSIS PATIENT",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("'{}' is not a known priority", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectDestination {
    #[serde(rename = "THC")]
    Thc,
    #[serde(rename = "HHS Oakville")]
    HhsOakville,
    #[serde(rename = "Any if waitlist is shorter")]
    ShortestWaitlist,
}

impl RedirectDestination {
    pub const ALL: [RedirectDestination; 3] = [
        RedirectDestination::Thc,
        RedirectDestination::HhsOakville,
        RedirectDestination::ShortestWaitlist,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RedirectDestination::Thc => "THC",
            RedirectDestination::HhsOakville => "HHS Oakville",
            RedirectDestination::ShortestWaitlist => "Any if waitlist is shorter",
        }
    }
}

impl FromStr for RedirectDestination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RedirectDestination::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("'{}' is not a known redirect destination", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Ok(Sex::Male),
            "F" | "FEMALE" => Ok(Sex::Female),
            other => Err(format!("'{}' is not M or F", other)),
        }
    }
}

// ==============================================================================
// SAFETY SCREENING
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreeningAnswer {
    Yes,
    No,
    #[default]
    Unknown,
}

impl FromStr for ScreeningAnswer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Ok(ScreeningAnswer::Yes),
            "no" | "n" => Ok(ScreeningAnswer::No),
            "unknown" | "" => Ok(ScreeningAnswer::Unknown),
            other => Err(format!("'{}' is not yes, no or unknown", other)),
        }
    }
}

macro_rules! screening_questions {
    ($($field:ident),+ $(,)?) => {
        /// Implant, metal and pregnancy checks answered before any scan.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default, deny_unknown_fields)]
        pub struct ScreeningQuestions {
            $(pub $field: ScreeningAnswer,)+
        }

        impl ScreeningQuestions {
            pub fn answer_mut(&mut self, field: &str) -> Option<&mut ScreeningAnswer> {
                match field {
                    $(stringify!($field) => Some(&mut self.$field),)+
                    _ => None,
                }
            }

            pub fn answers(&self) -> Vec<(&'static str, ScreeningAnswer)> {
                vec![$((stringify!($field), self.$field),)+]
            }
        }
    };
}

screening_questions!(
    previous_mri,
    metal_grinder,
    eye_injury,
    pregnancy,
    claustrophobic,
    cardiac_pacemaker,
    cochlear_implants,
    eye_surgery,
    cerebral_aneurysm,
    heart_valve,
    shrapnel,
    joint_replacement,
    intravascular,
    surgical_clips,
    tissue_expander,
    implanted_devices,
    vascular_access,
    iud_diaphragm,
    pain_pump,
    medication_patch,
    penile_prosthesis,
    hearing_aid,
    piercings,
    tattoo,
    dentures,
);

impl ScreeningQuestions {
    /// Questions answered "yes", which the technologist reviews before the scan.
    pub fn flagged(&self) -> Vec<&'static str> {
        self.answers()
            .into_iter()
            .filter(|(_, answer)| *answer == ScreeningAnswer::Yes)
            .map(|(name, _)| name)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExamAreas {
    pub head: bool,
    pub neck: bool,
    pub spine: bool,
    pub chest: bool,
    pub abdomen: bool,
    pub extremity: bool,
}

impl ExamAreas {
    pub fn flag_mut(&mut self, field: &str) -> Option<&mut bool> {
        match field {
            "head" => Some(&mut self.head),
            "neck" => Some(&mut self.neck),
            "spine" => Some(&mut self.spine),
            "chest" => Some(&mut self.chest),
            "abdomen" => Some(&mut self.abdomen),
            "extremity" => Some(&mut self.extremity),
            _ => None,
        }
    }
}

// ==============================================================================
// FORM
// ==============================================================================

/// A value written into one intake field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
    Null,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(flag) => write!(f, "{}", flag),
            FieldValue::Text(text) => write!(f, "{}", text),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl FieldValue {
    fn into_text(self, field: &str) -> Result<String, IntakeError> {
        match self {
            FieldValue::Text(text) => Ok(text),
            FieldValue::Null => Ok(String::new()),
            FieldValue::Flag(_) => Err(invalid(field, "expected text")),
        }
    }

    fn into_flag(self, field: &str) -> Result<bool, IntakeError> {
        match self {
            FieldValue::Flag(flag) => Ok(flag),
            FieldValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(true),
                "false" | "no" | "" => Ok(false),
                _ => Err(invalid(field, "expected true or false")),
            },
            FieldValue::Null => Ok(false),
        }
    }

    /// Parses into a single-choice value. Blank text and null clear the choice.
    fn into_choice<T>(self, field: &str) -> Result<Option<T>, IntakeError>
    where
        T: FromStr<Err = String>,
    {
        match self {
            FieldValue::Null => Ok(None),
            FieldValue::Text(text) if text.trim().is_empty() => Ok(None),
            FieldValue::Text(text) => text.parse().map(Some).map_err(|e: String| invalid(field, &e)),
            FieldValue::Flag(_) => Err(invalid(field, "expected text")),
        }
    }
}

fn invalid(field: &str, reason: &str) -> IntakeError {
    IntakeError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeForm {
    // Patient identity
    pub surname: String,
    pub first_name: String,
    pub dob: String,
    pub sex: Option<Sex>,
    pub health_card_number: String,

    // Contact
    pub street: String,
    pub apt_number: String,
    pub city: String,
    pub postal_code: String,
    pub phone_home: String,
    pub phone_work: String,

    // Workplace insurance claim
    pub is_wsib_claim: Option<bool>,
    pub claim_number: String,

    // Clinical
    pub area_to_be_examined: String,
    pub clinical_information: String,
    pub working_diagnosis: String,
    pub priority: Option<Priority>,
    pub redirect_to: Option<RedirectDestination>,
    pub patient_weight: String,
    pub surgical_history: String,

    pub screening: ScreeningQuestions,
    pub exam_areas: ExamAreas,

    // Referring physician
    pub referring_physician_name: String,
    pub referring_physician_address: String,
    pub referring_physician_postal_code: String,
    pub referring_physician_phone: String,
    pub referring_physician_fax: String,
    pub copies_to: String,

    // Prior imaging
    pub mri: String,
    pub ct_angio: String,
    pub xray: String,
    pub us: String,

    pub patient_signature: String,
    pub technologist: String,
}

impl IntakeForm {
    pub const REQUIRED_FIELDS: [&'static str; 5] = [
        "surname",
        "first_name",
        "dob",
        "health_card_number",
        "clinical_information",
    ];

    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one field. Dotted paths address the `screening` and
    /// `exam_areas` sections; anything the form does not know is rejected.
    pub fn update(&mut self, path: &str, value: impl Into<FieldValue>) -> Result<(), IntakeError> {
        let value = value.into();

        match path.split_once('.') {
            Some(("screening", field)) => {
                let answer = self
                    .screening
                    .answer_mut(field)
                    .ok_or_else(|| IntakeError::UnknownField(path.to_string()))?;
                *answer = match value {
                    FieldValue::Null => ScreeningAnswer::Unknown,
                    FieldValue::Flag(true) => ScreeningAnswer::Yes,
                    FieldValue::Flag(false) => ScreeningAnswer::No,
                    FieldValue::Text(text) => text.parse().map_err(|e: String| invalid(path, &e))?,
                };
                Ok(())
            }
            Some(("exam_areas", field)) => {
                let flag = self
                    .exam_areas
                    .flag_mut(field)
                    .ok_or_else(|| IntakeError::UnknownField(path.to_string()))?;
                *flag = value.into_flag(path)?;
                Ok(())
            }
            Some((section, _)) => Err(IntakeError::UnknownSection(section.to_string())),
            None => self.update_top_level(path, value),
        }
    }

    fn update_top_level(&mut self, field: &str, value: FieldValue) -> Result<(), IntakeError> {
        match field {
            "sex" => self.sex = value.into_choice(field)?,
            "priority" => self.priority = value.into_choice(field)?,
            "redirect_to" => self.redirect_to = value.into_choice(field)?,
            "is_wsib_claim" => {
                self.is_wsib_claim = match value {
                    FieldValue::Null => None,
                    FieldValue::Text(text) if text.trim().is_empty() => None,
                    other => Some(other.into_flag(field)?),
                }
            }
            _ => {
                let slot = self
                    .text_field_mut(field)
                    .ok_or_else(|| IntakeError::UnknownField(field.to_string()))?;
                *slot = value.into_text(field)?;
            }
        }
        Ok(())
    }

    fn text_field_mut(&mut self, field: &str) -> Option<&mut String> {
        let slot = match field {
            "surname" => &mut self.surname,
            "first_name" => &mut self.first_name,
            "dob" => &mut self.dob,
            "health_card_number" => &mut self.health_card_number,
            "street" => &mut self.street,
            "apt_number" => &mut self.apt_number,
            "city" => &mut self.city,
            "postal_code" => &mut self.postal_code,
            "phone_home" => &mut self.phone_home,
            "phone_work" => &mut self.phone_work,
            "claim_number" => &mut self.claim_number,
            "area_to_be_examined" => &mut self.area_to_be_examined,
            "clinical_information" => &mut self.clinical_information,
            "working_diagnosis" => &mut self.working_diagnosis,
            "patient_weight" => &mut self.patient_weight,
            "surgical_history" => &mut self.surgical_history,
            "referring_physician_name" => &mut self.referring_physician_name,
            "referring_physician_address" => &mut self.referring_physician_address,
            "referring_physician_postal_code" => &mut self.referring_physician_postal_code,
            "referring_physician_phone" => &mut self.referring_physician_phone,
            "referring_physician_fax" => &mut self.referring_physician_fax,
            "copies_to" => &mut self.copies_to,
            "mri" => &mut self.mri,
            "ct_angio" => &mut self.ct_angio,
            "xray" => &mut self.xray,
            "us" => &mut self.us,
            "patient_signature" => &mut self.patient_signature,
            "technologist" => &mut self.technologist,
            _ => return None,
        };
        Some(slot)
    }

    fn required_value(&self, field: &str) -> &str {
        match field {
            "surname" => &self.surname,
            "first_name" => &self.first_name,
            "dob" => &self.dob,
            "health_card_number" => &self.health_card_number,
            "clinical_information" => &self.clinical_information,
            _ => "",
        }
    }

    pub fn validate_for_submission(&self) -> Result<(), ValidationError> {
        let missing: Vec<String> = Self::REQUIRED_FIELDS
            .iter()
            .filter(|field| self.required_value(field).trim().is_empty())
            .map(|field| field.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }

    pub fn patient_display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.surname.trim())
            .trim()
            .to_string()
    }
}
