//! 提示词与响应结构定义
//!
//! 构造发送给推理服务的病例描述，以及要求服务遵循的JSON响应结构。

use serde_json::{json, Value};
use triage_core::{Language, PatientIntake};

fn or_none(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("None")
}

/// 分诊评估提示词
pub fn triage_prompt(intake: &PatientIntake, language: Language) -> String {
    let vitals = &intake.vitals;
    let contact_phone = intake
        .emergency_contact_phone
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("N/A");

    format!(
        r#"Act as an expert Emergency Medicine Doctor. Perform a triage assessment for the following patient based on the Emergency Severity Index (ESI) algorithm.

Patient Details:
- Age: {age}
- Gender: {gender}
- Chief Complaint/Symptoms: {symptoms}
- Medical History: {history}
- Suggested Specialist (User Input): {specialist}
- Requesting Teleconsult: {teleconsult}
- Data Source: {source}
- Emergency Contact: {contact_name} ({contact_phone})

Vital Signs:
- Heart Rate: {hr} bpm
- BP: {sys}/{dia} mmHg
- O2 Sat: {spo2}%
- Temp: {temp} C
- Resp Rate: {rr} /min

Tasks:
1. Assign an ESI level from 1 (resuscitation) to 5 (non-urgent) using the vitals and symptoms.
2. Test Before Touch: look for contagious disease risk (fever with cough, rash, travel history and similar).
   If the risk is high set 'infectionRisk' to true and give isolation or remote-assessment steps in 'infectionProtocol'; otherwise 'infectionProtocol' is "None".
3. Explain the ESI decision in 'esiReasoning'.
4. Give a confidence score from 0 to 100 reflecting data completeness and symptom clarity.

IMPORTANT: 'esiReasoning', 'summary', 'recommendedAction', 'specialistRequired' and 'infectionProtocol' MUST BE IN {lang}.
Clinical terms quoted from the input in another language must be kept faithfully, but the medical output must read professionally in the requested language.

Respond with a single JSON object only."#,
        age = intake.age,
        gender = intake.gender,
        symptoms = intake.symptoms,
        history = intake.medical_history,
        specialist = or_none(intake.suggested_specialist.as_deref()),
        teleconsult = if intake.request_teleconsult { "Yes" } else { "No" },
        source = intake.submission_source,
        contact_name = or_none(intake.emergency_contact_name.as_deref()),
        contact_phone = contact_phone,
        hr = vitals.heart_rate,
        sys = vitals.blood_pressure_sys,
        dia = vitals.blood_pressure_dia,
        spo2 = vitals.oxygen_saturation,
        temp = vitals.temperature,
        rr = vitals.respiratory_rate,
        lang = language.prompt_name(),
    )
}

/// 追问提示词
pub fn follow_up_prompt(symptoms: &str, age: &str, gender: &str, language: Language) -> String {
    format!(
        r#"Act as a remote triage assistant.
Patient: {age} years old, {gender}.
Reported symptoms: "{symptoms}"

Ask ONE follow-up question that best clarifies the severity (ESI level) or the infection risk.
Prioritise ruling out life-threatening emergencies and contagious disease.
Keep it conversational but clinical.

IMPORTANT: Write the question in {lang}.

Output only the question text."#,
        age = age,
        gender = gender,
        symptoms = symptoms,
        lang = language.prompt_name(),
    )
}

/// 发音指南提示词
pub fn pronunciation_prompt(text: &str) -> String {
    format!(
        r#"Identify complex medical terms, medication names, anatomical terms or otherwise difficult words in the text: "{}".
Give a user-friendly phonetic pronunciation for each term.
Return the result as a JSON array."#,
        text
    )
}

fn string_field(description: &str) -> Value {
    json!({ "type": "STRING", "description": description })
}

/// 分诊结果的响应结构，十个字段全部必填
pub fn triage_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "esiLevel": {
                "type": "INTEGER",
                "description": "Emergency Severity Index from 1 (Resuscitation) to 5 (Non-urgent)."
            },
            "esiDescription": string_field("Short label for the ESI level, e.g. 'Resuscitation', 'Emergent', 'Urgent'."),
            "esiReasoning": string_field("Short, specific explanation of why this ESI level was chosen."),
            "summary": string_field("Concise medical summary of the patient's condition."),
            "recommendedAction": string_field("Immediate action required, e.g. 'Prepare trauma bay'."),
            "specialistRequired": string_field("Type of specialist likely needed, e.g. 'Cardiologist'."),
            "riskFactors": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Key risk factors identified."
            },
            "infectionRisk": {
                "type": "BOOLEAN",
                "description": "True if symptoms suggest contagious disease requiring isolation or Test Before Touch."
            },
            "infectionProtocol": string_field("Isolation or remote protocol when infection risk is high; 'None' otherwise."),
            "confidenceScore": {
                "type": "INTEGER",
                "description": "Confidence from 0 to 100 in the ESI prediction."
            }
        },
        "required": [
            "esiLevel", "esiDescription", "esiReasoning", "summary", "recommendedAction",
            "specialistRequired", "riskFactors", "infectionRisk", "infectionProtocol", "confidenceScore"
        ]
    })
}

/// 发音指南的响应结构
pub fn pronunciation_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "term": { "type": "STRING" },
                "pronunciation": { "type": "STRING" }
            },
            "required": ["term", "pronunciation"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{SubmissionSource, VitalSigns};

    fn intake() -> PatientIntake {
        PatientIntake {
            name: "Malee".to_string(),
            age: "31".to_string(),
            gender: "Female".to_string(),
            symptoms: "ไข้สูง and dry cough for 3 days".to_string(),
            medical_history: "Asthma".to_string(),
            suggested_specialist: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            vitals: VitalSigns {
                heart_rate: "104".into(),
                blood_pressure_sys: "118".into(),
                blood_pressure_dia: "76".into(),
                temperature: "39.1".into(),
                oxygen_saturation: "95".into(),
                respiratory_rate: "24".into(),
            },
            submission_source: SubmissionSource::MobileApp,
            request_teleconsult: true,
        }
    }

    #[test]
    fn test_triage_prompt_embeds_intake() {
        let prompt = triage_prompt(&intake(), Language::Th);

        assert!(prompt.contains("Age: 31"));
        assert!(prompt.contains("ไข้สูง and dry cough"));
        assert!(prompt.contains("BP: 118/76 mmHg"));
        assert!(prompt.contains("Temp: 39.1 C"));
        assert!(prompt.contains("Data Source: mobile_app"));
        assert!(prompt.contains("Requesting Teleconsult: Yes"));
        assert!(prompt.contains("Emergency Contact: None (N/A)"));
        assert!(prompt.contains("MUST BE IN THAI"));
    }

    #[test]
    fn test_follow_up_prompt_is_language_tagged() {
        let prompt = follow_up_prompt("headache", "40", "Male", Language::En);
        assert!(prompt.contains("\"headache\""));
        assert!(prompt.contains("in ENGLISH"));
    }

    #[test]
    fn test_triage_schema_requires_all_fields() {
        let schema = triage_response_schema();
        let required = schema["required"].as_array().unwrap();
        let properties = schema["properties"].as_object().unwrap();

        assert_eq!(required.len(), properties.len());
        for field in required {
            assert!(properties.contains_key(field.as_str().unwrap()));
        }
    }
}
