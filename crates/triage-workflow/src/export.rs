//! 报表导出
//!
//! 将患者记录展平为固定列的表格行，供CSV或电子表格导出使用。
//! 列名与列序是下游报表流程依赖的接口，不可随意调整。

use crate::record::PatientRecord;
use serde::Serialize;
use triage_core::utils::format_export_timestamp;

/// 导出列名，顺序固定
pub const EXPORT_COLUMNS: [&str; 23] = [
    "ID",
    "Timestamp",
    "Name",
    "Age",
    "Gender",
    "Status",
    "Source",
    "ESI_Level",
    "ESI_Desc",
    "AI_Confidence",
    "Symptoms",
    "Medical_History",
    "HR",
    "BP_Sys",
    "BP_Dia",
    "SpO2",
    "Temp",
    "Resp_Rate",
    "Infection_Risk",
    "Infection_Protocol",
    "Teleconsult_Req",
    "Specialist",
    "AI_Reasoning",
];

/// 导出行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Age")]
    pub age: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "ESI_Level")]
    pub esi_level: String,
    #[serde(rename = "ESI_Desc")]
    pub esi_description: String,
    #[serde(rename = "AI_Confidence")]
    pub ai_confidence: String,
    #[serde(rename = "Symptoms")]
    pub symptoms: String,
    #[serde(rename = "Medical_History")]
    pub medical_history: String,
    #[serde(rename = "HR")]
    pub heart_rate: String,
    #[serde(rename = "BP_Sys")]
    pub bp_sys: String,
    #[serde(rename = "BP_Dia")]
    pub bp_dia: String,
    #[serde(rename = "SpO2")]
    pub spo2: String,
    #[serde(rename = "Temp")]
    pub temperature: String,
    #[serde(rename = "Resp_Rate")]
    pub respiratory_rate: String,
    #[serde(rename = "Infection_Risk")]
    pub infection_risk: String,
    #[serde(rename = "Infection_Protocol")]
    pub infection_protocol: String,
    #[serde(rename = "Teleconsult_Req")]
    pub teleconsult_requested: String,
    #[serde(rename = "Specialist")]
    pub specialist: String,
    #[serde(rename = "AI_Reasoning")]
    pub ai_reasoning: String,
}

impl ExportRow {
    pub fn from_record(record: &PatientRecord) -> Self {
        let analysis = record.ai_analysis();
        let vitals = record.vitals();

        Self {
            id: record.id().to_string(),
            timestamp: format_export_timestamp(&record.timestamp()),
            name: record.name().to_string(),
            age: record.age().to_string(),
            gender: record.gender().to_string(),
            status: record.status().to_string(),
            source: record.submission_source().to_string(),
            esi_level: analysis
                .map(|a| a.esi_level.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            esi_description: analysis
                .map(|a| a.esi_description.clone())
                .unwrap_or_default(),
            ai_confidence: format!(
                "{}%",
                analysis.map(|a| a.confidence_score).unwrap_or(0)
            ),
            symptoms: record.symptoms().to_string(),
            medical_history: record.medical_history().to_string(),
            heart_rate: vitals.heart_rate.to_string(),
            bp_sys: vitals.blood_pressure_sys.to_string(),
            bp_dia: vitals.blood_pressure_dia.to_string(),
            spo2: vitals.oxygen_saturation.to_string(),
            temperature: vitals.temperature.to_string(),
            respiratory_rate: vitals.respiratory_rate.to_string(),
            infection_risk: yes_no(analysis.map(|a| a.infection_risk).unwrap_or(false)),
            infection_protocol: analysis
                .map(|a| a.infection_protocol.clone())
                .unwrap_or_default(),
            teleconsult_requested: yes_no(record.teleconsult_requested()),
            specialist: analysis
                .map(|a| a.specialist_required.clone())
                .unwrap_or_else(|| "General".to_string()),
            ai_reasoning: analysis
                .map(|a| a.esi_reasoning.clone())
                .unwrap_or_default(),
        }
    }

    /// 按 `EXPORT_COLUMNS` 顺序输出各列取值
    pub fn values(&self) -> [&str; 23] {
        [
            self.id.as_str(),
            self.timestamp.as_str(),
            self.name.as_str(),
            self.age.as_str(),
            self.gender.as_str(),
            self.status.as_str(),
            self.source.as_str(),
            self.esi_level.as_str(),
            self.esi_description.as_str(),
            self.ai_confidence.as_str(),
            self.symptoms.as_str(),
            self.medical_history.as_str(),
            self.heart_rate.as_str(),
            self.bp_sys.as_str(),
            self.bp_dia.as_str(),
            self.spo2.as_str(),
            self.temperature.as_str(),
            self.respiratory_rate.as_str(),
            self.infection_risk.as_str(),
            self.infection_protocol.as_str(),
            self.teleconsult_requested.as_str(),
            self.specialist.as_str(),
            self.ai_reasoning.as_str(),
        ]
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

/// 展平导出，每条记录一行
pub fn export_flat(records: &[PatientRecord]) -> Vec<ExportRow> {
    records.iter().map(ExportRow::from_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::{analysis_with_esi, sample_intake};

    #[test]
    fn test_missing_analysis_uses_placeholders() {
        let mut record = PatientRecord::create(sample_intake(), analysis_with_esi(2));
        record.clear_analysis_for_test();

        let rows = export_flat(&[record]);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.esi_level, "N/A");
        assert_eq!(row.ai_confidence, "0%");
        assert_eq!(row.esi_description, "");
        assert_eq!(row.infection_risk, "No");
        assert_eq!(row.specialist, "General");
        assert_eq!(row.ai_reasoning, "");
    }

    #[test]
    fn test_row_with_analysis() {
        let record = PatientRecord::create(sample_intake(), analysis_with_esi(2));
        let row = ExportRow::from_record(&record);

        assert_eq!(row.esi_level, "2");
        assert_eq!(row.ai_confidence, "85%");
        assert_eq!(row.status, "pending");
        assert_eq!(row.source, "walk_in");
        assert_eq!(row.heart_rate, "112");
        assert_eq!(row.teleconsult_requested, "No");
        assert_eq!(row.specialist, "Cardiologist");
    }

    #[test]
    fn test_serialized_columns_follow_fixed_order() {
        let record = PatientRecord::create(sample_intake(), analysis_with_esi(2));
        let row = ExportRow::from_record(&record);

        // serde_json 默认按键名排序存储对象，这里用流式序列化结果检查列序
        let text = serde_json::to_string(&row).unwrap();
        let mut last = 0;
        for column in EXPORT_COLUMNS {
            let key = format!("\"{}\":", column);
            let pos = text.find(&key).unwrap();
            assert!(pos >= last, "column {} out of order", column);
            last = pos;
        }

        assert_eq!(row.values()[0], row.id);
        assert_eq!(row.values()[22], row.ai_reasoning);
    }
}
