//! In-process simulated backend.
//!
//! Produces plausible wizard artifacts with a short artificial delay so the
//! whole flow can run without a server. Experiments are kept in memory so
//! create/update/list behave like the real backend.

use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;

use super::ApiClient;
use crate::error::ApiError;
use crate::flow::model::{
    AnalyticsEventPayload, ConsistencyCheckResult, ContentMatrix, DEFAULT_RECOMMENDED_PLATFORMS,
    DayArticle, ExperimentRecord, ExperimentStatus, GrowthArcItem, GrowthExperiment, GrowthPath,
    IdentityModelCard, LaunchKit, LaunchKitDay, MonetizationMap, MonetizationWeek,
    OnboardingInput, OnboardingProfile, PersonaConstitution, PillarPlan, RiskTolerance,
};
use crate::identity::prefixed_id;
use crate::normalize::dto::MONETIZATION_SEPARATOR;
use crate::normalize::{DayArticleRequest, NewExperiment};

/// Extra random latency added on top of the configured minimum.
const LATENCY_JITTER_MS: u64 = 120;

/// Drafts shorter than this (in characters) are flagged as thin.
const MIN_DRAFT_CHARS: usize = 120;

/// Candidate identities generated per request.
const MIN_CANDIDATES: usize = 3;
const MAX_CANDIDATES: usize = 5;

/// Days in a generated launch kit.
const LAUNCH_KIT_DAYS: u32 = 7;

/// Red-flag substrings: illegality, impersonation, infringement, guaranteed
/// returns, insider information, ghost posting, fabrication.
static RISK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(违法|冒充|侵权|保证收益|内幕|代发|虚假)").expect("valid risk pattern")
});

const RISK_WARNING: &str = "草稿触发风险边界关键词，请先修改后发布。";

struct CandidateTemplate {
    title: &'static str,
    pain: &'static str,
    differentiation: &'static str,
}

const CANDIDATES: [CandidateTemplate; MAX_CANDIDATES] = [
    CandidateTemplate {
        title: "职场效率解剖师",
        pain: "有能力但表达效率低，内容难以持续产出。",
        differentiation: "用真实周复盘替代鸡汤，强调可复制 SOP 与交付模板。",
    },
    CandidateTemplate {
        title: "行业趋势翻译官",
        pain: "看得懂趋势新闻，但不知道如何落地到工作。",
        differentiation: "每条观点都附带“本周可执行动作”，降低认知到执行距离。",
    },
    CandidateTemplate {
        title: "高客单咨询产品化教练",
        pain: "服务能力强，但缺少稳定获客与叙事系统。",
        differentiation: "把咨询案例拆成公开方法资产，构建低门槛引流入口。",
    },
    CandidateTemplate {
        title: "副业项目复盘官",
        pain: "想做副业但反复起步失败，缺少可验证的小步路径。",
        differentiation: "只公开做过的项目和真实数据，失败复盘与成功案例同等比重。",
    },
    CandidateTemplate {
        title: "团队管理实验员",
        pain: "刚转管理岗，缺少能直接套用的沟通与授权方法。",
        differentiation: "每周一个管理小实验，附带前后对比与可复用话术。",
    },
];

const PILLARS: [&str; 5] = [
    "职业问题拆解",
    "方法模板演示",
    "失败复盘与修正",
    "行业趋势应用",
    "个人成长纪实",
];

const TONE_KEYWORDS: [&str; 5] = ["克制", "结构化", "可落地", "不夸张", "反空话"];

const TONE_EXAMPLES: [&str; 5] = [
    "先说结论，再给一段你今天就能执行的动作。",
    "我会告诉你为什么这样做，而不只是给你模板。",
    "这不是万能解法，但它适合时间有限的上班族。",
    "如果你只能做一件事，先完成这个最小版本。",
    "每次复盘都要落到“下周行动”而不是感受。",
];

const LONG_TERM_VIEWS: [&str; 5] = [
    "稳定输出比偶发爆款更重要。",
    "方法资产要能被反复复用。",
    "信任来自长期一致，而不是高频刺激。",
    "内容要服务真实业务目标。",
    "风险边界要先于增长冲动。",
];

const MONETIZATION_ORDER: [&str; 3] = ["私域线索验证", "小额咨询验证", "标准化服务验证"];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub struct MockApiClient {
    min_latency: Duration,
    experiments: Mutex<Vec<ExperimentRecord>>,
}

impl MockApiClient {
    pub fn new(min_latency: Duration) -> Self {
        Self {
            min_latency,
            experiments: Mutex::new(Vec::new()),
        }
    }

    async fn pause(&self) {
        let jitter = rand::thread_rng().gen_range(0..=LATENCY_JITTER_MS);
        tokio::time::sleep(self.min_latency + Duration::from_millis(jitter)).await;
    }

    fn build_models(profile: &OnboardingProfile) -> Vec<IdentityModelCard> {
        let count = profile
            .energy_curve
            .len()
            .clamp(MIN_CANDIDATES, MAX_CANDIDATES);
        let sensitive_topic = if profile.risk_tolerance == RiskTolerance::Low {
            "高争议公共议题"
        } else {
            "无证据断言"
        };

        CANDIDATES
            .iter()
            .take(count)
            .enumerate()
            .map(|(idx, template)| IdentityModelCard {
                id: prefixed_id(&format!("identity_{}", idx + 1)),
                title: template.title.to_string(),
                target_audience_pain: template.pain.to_string(),
                content_pillars: strings(&PILLARS[..4]),
                tone_style_keywords: strings(&TONE_KEYWORDS),
                tone_examples: strings(&TONE_EXAMPLES),
                long_term_views: strings(&LONG_TERM_VIEWS),
                differentiation: template.differentiation.to_string(),
                growth_path: GrowthPath {
                    first_quarter: "完成 24 条结构化内容，验证 2 个固定栏目。".to_string(),
                    year_one: "形成“公开内容 + 服务产品”双轮结构并持续迭代。".to_string(),
                },
                monetization_validation_order: strings(&MONETIZATION_ORDER),
                monetization_map: MONETIZATION_ORDER.join(MONETIZATION_SEPARATOR),
                risk_boundaries: vec![
                    format!("避免触碰与 {sensitive_topic} 相关表达"),
                    "不得使用无法核实的数据结论".to_string(),
                    "不得冒充或暗示平台官方身份".to_string(),
                ],
            })
            .collect()
    }

    fn check_consistency(draft: &str, identity_model: &IdentityModelCard) -> ConsistencyCheckResult {
        let mut deviations = Vec::new();
        let mut reasons = Vec::new();
        let mut suggestions = Vec::new();

        if draft.chars().count() < MIN_DRAFT_CHARS {
            deviations.push("草稿信息密度偏低，难以支撑“可执行性”。".to_string());
            reasons.push("篇幅偏短，缺少动作步骤。".to_string());
            suggestions.push("补充 3 个具体动作和 1 个验证标准。".to_string());
        }

        if !identity_model
            .tone_style_keywords
            .iter()
            .any(|k| draft.contains(k.as_str()))
        {
            deviations.push("草稿未体现身份既定语气关键词。".to_string());
            reasons.push("表达风格与人格宪法脱节。".to_string());
            suggestions.push("补充“先结论后步骤”的句式，减少空泛修饰。".to_string());
        }

        let risk_warning = RISK_PATTERN
            .is_match(draft)
            .then(|| RISK_WARNING.to_string());
        let score = ConsistencyCheckResult::derive_score(
            deviations.len(),
            reasons.len(),
            risk_warning.is_some(),
        );

        ConsistencyCheckResult {
            deviations,
            reasons,
            suggestions,
            risk_warning,
            score,
        }
    }

    fn build_content_matrix(identity_model: &IdentityModelCard) -> ContentMatrix {
        let pillars = identity_model
            .content_pillars
            .iter()
            .map(|pillar| PillarPlan {
                pillar: pillar.clone(),
                topics: (1..=3).map(|n| format!("{pillar}：选题 {n}")).collect(),
                platform_rewrites: DEFAULT_RECOMMENDED_PLATFORMS
                    .iter()
                    .map(|platform| {
                        (
                            platform.to_string(),
                            vec![format!("{platform} 版本：{pillar} 的短结论 + 一个动作")],
                        )
                    })
                    .collect(),
            })
            .collect();
        ContentMatrix { pillars }
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    fn backend_name(&self) -> &'static str {
        "mock"
    }

    async fn create_onboarding_session(&self) -> Result<String, ApiError> {
        self.pause().await;
        Ok(prefixed_id("session"))
    }

    async fn complete_onboarding(
        &self,
        _session_id: &str,
        input: &OnboardingInput,
    ) -> Result<OnboardingProfile, ApiError> {
        self.pause().await;
        Ok(OnboardingProfile {
            skill_stack: input.skills.clone(),
            energy_curve: input.interests.clone(),
            cognitive_style: input.cognitive_style.clone(),
            value_boundaries: input.value_boundaries.clone(),
            risk_tolerance: input.risk_tolerance,
            weekly_hours: input.weekly_hours,
            recommended_platforms: strings(&DEFAULT_RECOMMENDED_PLATFORMS),
        })
    }

    async fn generate_identity_models(
        &self,
        profile: &OnboardingProfile,
    ) -> Result<Vec<IdentityModelCard>, ApiError> {
        self.pause().await;
        Ok(Self::build_models(profile))
    }

    async fn select_identity(
        &self,
        _primary_id: &str,
        _backup_id: Option<&str>,
    ) -> Result<(), ApiError> {
        self.pause().await;
        Ok(())
    }

    async fn generate_persona_constitution(
        &self,
        identity_model: &IdentityModelCard,
    ) -> Result<PersonaConstitution, ApiError> {
        self.pause().await;
        let title = &identity_model.title;
        Ok(PersonaConstitution {
            common_words: strings(&["结论先行", "可执行", "复盘", "本周动作", "最小版本"]),
            forbidden_words: strings(&["躺赚", "无脑", "闭眼冲", "唯一真相"]),
            sentence_preferences: strings(&["先结论后拆解", "每段给动作", "少形容词，多证据"]),
            immutable_positions: strings(&[
                "不制造焦虑来换取流量",
                "不提供无法验证的收益承诺",
                "尊重平台规则和法律边界",
            ]),
            narrative_mainline: format!("{title}：把专业经验转化为可执行内容资产。"),
            growth_arc: vec![
                GrowthArcItem {
                    stage: "0-4 周".to_string(),
                    story_template: format!("从个人观察切入，建立 {title} 的基础可信度。"),
                },
                GrowthArcItem {
                    stage: "2-3 月".to_string(),
                    story_template: format!("持续发布案例复盘，形成 {title} 的稳定栏目。"),
                },
                GrowthArcItem {
                    stage: "3-12 月".to_string(),
                    story_template: "沉淀方法论与服务产品，让身份具备可复制收益。".to_string(),
                },
            ],
        })
    }

    async fn generate_launch_kit(
        &self,
        identity_model: &IdentityModelCard,
        _constitution: &PersonaConstitution,
    ) -> Result<LaunchKit, ApiError> {
        self.pause().await;
        Ok(LaunchKit {
            days: (1..=LAUNCH_KIT_DAYS)
                .map(|day| LaunchKitDay {
                    day,
                    theme: format!("Day {day}：{} 启动主题", identity_model.title),
                    draft_outline: "痛点场景 -> 拆解框架 -> 3 步动作 -> 本周验证指标".to_string(),
                    opening: "如果你最近也遇到这个问题，这条内容给你一个可执行起点。".to_string(),
                })
                .collect(),
            sustainable_columns: strings(&["每周问题拆解", "真实案例复盘", "工具模板共创"]),
            growth_experiment: GrowthExperiment {
                hypothesis: "标题中加入“可执行动作”能提升收藏率。".to_string(),
                variables: strings(&["标题 A/B", "发布时间", "结尾提问方式"]),
                execution_cycle: "7 天".to_string(),
                success_metric: "收藏率提升 >= 20%".to_string(),
            },
        })
    }

    async fn generate_day_article(
        &self,
        request: &DayArticleRequest,
    ) -> Result<DayArticle, ApiError> {
        self.pause().await;
        let title = format!("Day {} · {}", request.day_no, request.theme);
        let markdown = format!(
            "# {title}\n\n{opening}\n\n## 提纲\n\n{outline}\n\n## 今日动作\n\n- 写下一个你本周要验证的问题\n- 用 {identity} 的视角给出 3 步解法\n",
            opening = request.opening,
            outline = request.draft_outline,
            identity = request.identity_model.title,
        );
        Ok(DayArticle {
            day_no: request.day_no,
            title,
            markdown,
        })
    }

    async fn run_consistency_check(
        &self,
        draft: &str,
        identity_model: &IdentityModelCard,
        _constitution: &PersonaConstitution,
    ) -> Result<ConsistencyCheckResult, ApiError> {
        self.pause().await;
        Ok(Self::check_consistency(draft, identity_model))
    }

    async fn generate_content_matrix(
        &self,
        identity_model: &IdentityModelCard,
    ) -> Result<ContentMatrix, ApiError> {
        self.pause().await;
        Ok(Self::build_content_matrix(identity_model))
    }

    async fn create_experiment(
        &self,
        _identity_model: &IdentityModelCard,
        experiment: &NewExperiment,
    ) -> Result<String, ApiError> {
        self.pause().await;
        let id = prefixed_id("experiment");
        self.experiments
            .lock()
            .expect("mock experiments lock poisoned")
            .push(ExperimentRecord {
                id: id.clone(),
                hypothesis: experiment.hypothesis.clone(),
                variables: experiment.variables.clone(),
                execution_cycle: experiment.execution_cycle.clone(),
                result: String::new(),
                conclusion: String::new(),
                status: ExperimentStatus::Planned,
            });
        Ok(id)
    }

    async fn update_experiment_result(
        &self,
        experiment_id: &str,
        result: &str,
        conclusion: &str,
    ) -> Result<(), ApiError> {
        self.pause().await;
        let mut experiments = self
            .experiments
            .lock()
            .expect("mock experiments lock poisoned");
        let record = experiments
            .iter_mut()
            .find(|e| e.id == experiment_id)
            .ok_or_else(|| ApiError::from_status(404, None))?;
        record.result = result.to_string();
        record.conclusion = conclusion.to_string();
        record.status = ExperimentStatus::Completed;
        Ok(())
    }

    async fn list_experiments(&self) -> Result<Vec<ExperimentRecord>, ApiError> {
        Ok(self
            .experiments
            .lock()
            .expect("mock experiments lock poisoned")
            .clone())
    }

    async fn generate_monetization_map(
        &self,
        identity_model: &IdentityModelCard,
    ) -> Result<MonetizationMap, ApiError> {
        self.pause().await;
        let order = &identity_model.monetization_validation_order;
        let weeks = order
            .iter()
            .zip(1u32..)
            .map(|(step, week_no)| MonetizationWeek {
                week_no,
                goal: step.clone(),
                task: format!("围绕“{step}”发布 2 条内容并附带行动入口"),
                deliverable: format!("{step} 的最小可交付版本"),
                validation_metric: "至少 3 条有效咨询或线索".to_string(),
            })
            .collect();
        Ok(MonetizationMap {
            primary_path: order.first().cloned().unwrap_or_default(),
            backup_path: order.get(1).cloned().unwrap_or_default(),
            weeks,
        })
    }

    async fn track_event(&self, _event: &AnalyticsEventPayload) -> Result<(), ApiError> {
        Ok(())
    }
}
