use std::sync::Arc;

use identity_wizard::api::create_client;
use identity_wizard::config::ClientConfig;
use identity_wizard::export::ExportOptions;
use identity_wizard::flow::model::{OnboardingInput, RiskTolerance};
use identity_wizard::flow::{FlowStore, WIZARD_GUARDS};
use identity_wizard::identity::StableUserId;
use identity_wizard::normalize::NewExperiment;
use identity_wizard::storage::{FileStore, KeyValueStore};
use identity_wizard::wizard::Wizard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ClientConfig::from_env()?;

    eprintln!("🧭 Identity Wizard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {:?} ({})", config.backend, config.api_base);
    eprintln!("   Data dir: {}", config.data_dir.display());

    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_dir)?);
    let user_id = Arc::new(StableUserId::new(
        Arc::clone(&storage),
        config.user_id_strategy,
    ));
    eprintln!("   User: {}", user_id.get());

    let api = create_client(&config, Arc::clone(&user_id));
    let store = Arc::new(FlowStore::load(storage));
    let wizard = Wizard::new(api, store, user_id, &config);

    // ── Guard table ──────────────────────────────────────────────────────
    for guard in WIZARD_GUARDS {
        tracing::info!(
            path = guard.path,
            requires = guard.prerequisite,
            fallback = guard.fallback,
            allowed = ?wizard.navigate(guard.path),
            "Route guard"
        );
    }

    // Each run starts from a clean flow.
    wizard.reset();

    // ── Walk the wizard ─────────────────────────────────────────────────
    let input = OnboardingInput {
        skills: vec!["写作".into(), "项目管理".into()],
        interests: vec!["效率工具".into(), "个人成长".into(), "理财入门".into()],
        cognitive_style: "结构化".into(),
        value_boundaries: vec!["不夸大收益".into()],
        risk_tolerance: RiskTolerance::Medium,
        weekly_hours: 8,
        goals: vec!["三个月内获得第一个付费线索".into()],
    };
    wizard.complete_onboarding(input).await?;

    let models = wizard
        .generate_identity_models()
        .await?
        .completed()
        .unwrap_or_default();
    let mut ids = models.iter().map(|m| m.id.as_str());
    let Some(primary) = ids.next() else {
        anyhow::bail!("backend returned no identity models");
    };
    wizard.select_identity(primary, ids.next()).await?;

    wizard.generate_persona().await?;
    let kit = wizard.generate_launch_kit().await?.completed();
    if let Some(first_day) = kit.as_ref().and_then(|k| k.days.first()) {
        if let Some(article) = wizard.generate_day_article(first_day.day).await?.completed() {
            tracing::info!(title = %article.title, "Day article ready");
        }
    }

    let draft = kit
        .as_ref()
        .and_then(|k| k.days.first())
        .map(|d| format!("{}\n\n{}", d.opening, d.draft_outline))
        .unwrap_or_default();
    if let Some(check) = wizard.run_consistency_check(&draft).await?.completed() {
        tracing::info!(score = check.score, risk = ?check.risk_warning, "Draft checked");
    }
    wizard.mark_content_published().await;

    wizard.generate_content_matrix().await?;
    let experiment = wizard
        .create_experiment(NewExperiment {
            hypothesis: "清单型标题的收藏率更高".into(),
            variables: vec!["标题结构".into()],
            execution_cycle: "7 天".into(),
        })
        .await?
        .completed();
    if let Some(experiment) = experiment {
        wizard
            .record_experiment_result(&experiment.id, "收藏率 +18%", "保留清单型标题")
            .await?;
    }

    wizard.generate_monetization_map().await?;
    wizard.confirm_first_revenue("demo run").await;

    // ── Export ───────────────────────────────────────────────────────────
    let outcome = wizard.export(ExportOptions::default()).await?;
    eprintln!(
        "   Exported {} ({} events recorded)",
        outcome.file_name,
        wizard.state().events.len()
    );

    Ok(())
}
