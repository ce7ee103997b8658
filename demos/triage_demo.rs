//! 分诊工作流演示程序
//!
//! 不依赖外部推理服务，用基于生命体征的规则评估器演示：
//! 提交分诊、SOS求救、状态变更、远程会诊、排序名册和导出

use async_trait::async_trait;
use std::sync::Arc;
use triage::core::{
    AiAnalysisResult, GeoLocation, Language, PatientIntake, PatientStatus, SubmissionSource,
    VitalSigns,
};
use triage::workflow::{
    InMemoryRoster, IntakeSubmission, RosterFilter, SosSubmission, TriageAssessor, TriageEngine,
    EXPORT_COLUMNS,
};

/// 按血氧和心率粗略分级的离线评估器
struct VitalsRuleAssessor;

#[async_trait]
impl TriageAssessor for VitalsRuleAssessor {
    async fn assess_patient(&self, intake: &PatientIntake, _language: Language) -> AiAnalysisResult {
        let spo2 = intake.vitals.oxygen_saturation.value().unwrap_or(100.0);
        let heart_rate = intake.vitals.heart_rate.value().unwrap_or(80.0);

        let (esi_level, description) = if spo2 < 90.0 {
            (1, "Resuscitation")
        } else if heart_rate > 110.0 {
            (2, "Emergent")
        } else if intake.vitals.has_fever() {
            (3, "Urgent")
        } else {
            (4, "Less Urgent")
        };

        AiAnalysisResult {
            esi_level,
            esi_description: description.to_string(),
            esi_reasoning: format!("SpO2 {}%, HR {} bpm", spo2, heart_rate),
            summary: intake.symptoms.clone(),
            recommended_action: "Assess at triage desk".to_string(),
            specialist_required: "General ER Physician".to_string(),
            risk_factors: Vec::new(),
            infection_risk: intake.vitals.has_fever(),
            infection_protocol: if intake.vitals.has_fever() {
                "Isolate and mask".to_string()
            } else {
                "None".to_string()
            },
            confidence_score: 60,
        }
    }
}

fn intake(name: &str, symptoms: &str, hr: &str, spo2: &str, temp: &str) -> PatientIntake {
    PatientIntake {
        name: name.to_string(),
        age: "45".to_string(),
        gender: "Female".to_string(),
        symptoms: symptoms.to_string(),
        medical_history: "None".to_string(),
        suggested_specialist: None,
        emergency_contact_name: None,
        emergency_contact_phone: None,
        vitals: VitalSigns {
            heart_rate: hr.into(),
            blood_pressure_sys: "120".into(),
            blood_pressure_dia: "80".into(),
            temperature: temp.into(),
            oxygen_saturation: spo2.into(),
            respiratory_rate: "18".into(),
        },
        submission_source: SubmissionSource::MobileApp,
        request_teleconsult: false,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let engine = TriageEngine::new(Arc::new(InMemoryRoster::new()), Arc::new(VitalsRuleAssessor));

    println!("🚑 急诊分诊工作流演示\n");

    // 1. 常规分诊提交
    let sprain = engine
        .submit_intake(IntakeSubmission::new(intake(
            "Somchai", "Twisted ankle", "82", "99", "36.7",
        )))
        .await?;
    let fever = engine
        .submit_intake(IntakeSubmission::new(intake(
            "Nok", "Fever and cough", "96", "97", "38.9",
        )))
        .await?;
    let chest = engine
        .submit_intake(IntakeSubmission::new(intake(
            "Anan", "Crushing chest pain", "124", "94", "37.0",
        )))
        .await?;
    println!("✅ 提交了 3 名患者");

    // 2. SOS求救
    let sos = engine
        .submit_sos(SosSubmission {
            location: Some(GeoLocation {
                lat: 13.7563,
                lng: 100.5018,
            }),
            ..Default::default()
        })
        .await?;
    println!("🆘 SOS患者 {} 已建档 (ESI {})", sos.id(), sos.effective_esi());

    // 3. 状态变更和远程会诊
    engine.change_status(chest.id(), PatientStatus::Admitted).await?;
    engine.change_status(sprain.id(), PatientStatus::Triaged).await?;
    engine.request_teleconsult(fever.id()).await?;

    // 4. 排序名册
    println!("\n📋 名册 (状态 → ESI → 最新优先):");
    for record in engine.sorted_patients(&RosterFilter::default()).await {
        println!(
            "   [{}] ESI {} {} - {}",
            record.status(),
            record.effective_esi(),
            record.name(),
            record.symptoms()
        );
    }

    let teleconsult = engine
        .sorted_patients(&RosterFilter::teleconsult_only())
        .await;
    println!("\n📞 远程会诊申请: {} 名", teleconsult.len());

    // 5. 历史日志
    let chest = engine.get_patient(chest.id()).await?;
    println!("\n🕑 {} 的历史:", chest.name());
    for event in chest.history_newest_first() {
        println!("   {:?}: {}", event.event_type(), event.details);
    }

    // 6. 统计和导出
    let stats = engine.stats().await;
    println!("\n📊 统计: {}", serde_json::to_string_pretty(&stats)?);

    println!("\n📤 导出:");
    println!("{}", EXPORT_COLUMNS.join(","));
    for row in engine.export().await {
        println!("{}", row.values().join(","));
    }

    Ok(())
}
