//! Generation feedback — duplicate suppression and rotating progress hints
//! for long-running generation actions.
//!
//! Each action owns one [`GenerationFeedback`]. While an invocation is
//! pending, further triggers are suppressed without calling the backend, and
//! a background ticker rotates the hint text. The ticker is aborted when the
//! action settles, when the controller is stopped or reset, and on drop.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Shown when an action has no hints configured.
pub const FALLBACK_HINT: &str = "正在处理中...";

/// Default rotation period.
pub const DEFAULT_HINT_INTERVAL: Duration = Duration::from_millis(1800);

/// Static progress copy for one generation action.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackCopy {
    pub title: &'static str,
    pub description: &'static str,
    pub hints: &'static [&'static str],
}

/// The wizard's long-running generation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationAction {
    Onboarding,
    IdentityModels,
    PersonaConstitution,
    LaunchKit,
    DayArticle,
    ConsistencyCheck,
    ContentMatrix,
    Experiment,
    MonetizationMap,
}

impl GenerationAction {
    pub const ALL: [GenerationAction; 9] = [
        Self::Onboarding,
        Self::IdentityModels,
        Self::PersonaConstitution,
        Self::LaunchKit,
        Self::DayArticle,
        Self::ConsistencyCheck,
        Self::ContentMatrix,
        Self::Experiment,
        Self::MonetizationMap,
    ];

    pub fn copy(self) -> FeedbackCopy {
        match self {
            Self::Onboarding => FeedbackCopy {
                title: "正在生成能力画像",
                description: "Agent 正在汇总你的输入并构建可执行画像。",
                hints: &[
                    "正在整理技能与兴趣信号...",
                    "正在对齐风险偏好与时间投入...",
                    "正在输出结构化能力画像...",
                ],
            },
            Self::IdentityModels => FeedbackCopy {
                title: "正在生成身份模型",
                description: "Agent 正在推演候选身份并检查差异化字段完整性。",
                hints: &[
                    "正在生成候选身份卡...",
                    "正在对比内容支柱与语气风格...",
                    "正在准备可选择的主/备身份...",
                ],
            },
            Self::PersonaConstitution => FeedbackCopy {
                title: "正在生成人格宪法",
                description: "Agent 正在构建口吻词典、立场边界与叙事主线。",
                hints: &[
                    "正在提取稳定语气规则...",
                    "正在写入观点护城河...",
                    "正在形成成长叙事模板...",
                ],
            },
            Self::LaunchKit => FeedbackCopy {
                title: "正在生成 7-Day Launch Kit",
                description: "Agent 正在生成 7 天主题、大纲与增长实验建议。",
                hints: &[
                    "正在生成 7 天发文主题...",
                    "正在编排每日草稿大纲...",
                    "正在输出可持续栏目与实验建议...",
                ],
            },
            Self::DayArticle => FeedbackCopy {
                title: "正在生成当日长文",
                description: "Agent 正在把当日大纲扩写为可发布的完整文章。",
                hints: &["正在展开开场段落...", "正在补全步骤与案例...", "正在整理 Markdown 排版..."],
            },
            Self::ConsistencyCheck => FeedbackCopy {
                title: "正在执行一致性检查",
                description: "Agent 正在对照人格宪法识别偏离项并给出改写建议。",
                hints: &[
                    "正在扫描语气与立场偏离...",
                    "正在定位潜在风险边界...",
                    "正在整理可执行修改建议...",
                ],
            },
            Self::ContentMatrix => FeedbackCopy {
                title: "正在生成内容矩阵",
                description: "Agent 正在按内容支柱展开选题并适配各平台。",
                hints: &["正在拆分内容支柱...", "正在生成选题清单...", "正在适配平台改写..."],
            },
            Self::Experiment => FeedbackCopy {
                title: "正在记录增长实验",
                description: "正在保存实验假设与变量。",
                hints: &["正在同步实验记录..."],
            },
            Self::MonetizationMap => FeedbackCopy {
                title: "正在生成变现路线图",
                description: "Agent 正在结合实验结果规划逐周验证任务。",
                hints: &["正在确定主/备变现路径...", "正在编排逐周验证任务...", "正在设定验证指标..."],
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    Idle,
    Pending,
    Succeeded,
    /// Terminal like `Idle`: the next trigger runs, it is never suppressed.
    Failed,
}

/// Result of triggering an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Triggered<T> {
    /// The action ran to completion.
    Completed(T),
    /// An invocation was already pending; nothing was called.
    Suppressed,
}

impl<T> Triggered<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Suppressed => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }
}

pub struct GenerationFeedback {
    label: &'static str,
    hints: Vec<String>,
    interval: Duration,
    status: Mutex<GenerationStatus>,
    hint_index: Arc<AtomicUsize>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl GenerationFeedback {
    pub fn new(label: &'static str, hints: Vec<String>, interval: Duration) -> Self {
        Self {
            label,
            hints,
            interval,
            status: Mutex::new(GenerationStatus::Idle),
            hint_index: Arc::new(AtomicUsize::new(0)),
            ticker: Mutex::new(None),
        }
    }

    /// Controller preloaded with an action's hint copy.
    pub fn for_action(action: GenerationAction, interval: Duration) -> Self {
        let copy = action.copy();
        Self::new(
            copy.title,
            copy.hints.iter().map(|h| h.to_string()).collect(),
            interval,
        )
    }

    pub fn status(&self) -> GenerationStatus {
        *self.status.lock().expect("feedback status lock poisoned")
    }

    pub fn is_pending(&self) -> bool {
        self.status() == GenerationStatus::Pending
    }

    /// Hint to display right now.
    pub fn current_hint(&self) -> &str {
        if self.hints.is_empty() {
            return FALLBACK_HINT;
        }
        let index = self.hint_index.load(Ordering::Relaxed) % self.hints.len();
        &self.hints[index]
    }

    /// Whether a rotation ticker is currently active.
    pub fn is_rotating(&self) -> bool {
        self.ticker
            .lock()
            .expect("feedback ticker lock poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start rotating hints. No-op when already rotating, when there is at
    /// most one hint, or outside a Tokio runtime.
    pub fn start(&self) {
        if self.hints.len() <= 1 {
            return;
        }
        let mut ticker = self.ticker.lock().expect("feedback ticker lock poisoned");
        if ticker.is_some() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(action = self.label, "No runtime; hint rotation disabled");
            return;
        };

        let index = Arc::clone(&self.hint_index);
        let len = self.hints.len();
        let period = self.interval;
        *ticker = Some(runtime.spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                let _ = index.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| {
                    Some((i + 1) % len)
                });
            }
        }));
    }

    /// Stop rotating, keeping the current hint.
    pub fn stop(&self) {
        if let Some(handle) = self
            .ticker
            .lock()
            .expect("feedback ticker lock poisoned")
            .take()
        {
            handle.abort();
        }
    }

    /// Stop rotating and rewind to the first hint.
    pub fn reset(&self) {
        self.stop();
        self.hint_index.store(0, Ordering::Relaxed);
    }

    /// Run `action` unless an invocation is already pending.
    ///
    /// Errors from `action` are returned unchanged; the controller ends in
    /// `Failed` and accepts a retry.
    pub async fn run<T, E, F, Fut>(&self, action: F) -> Result<Triggered<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut status = self.status.lock().expect("feedback status lock poisoned");
            if *status == GenerationStatus::Pending {
                tracing::debug!(action = self.label, "Suppressed duplicate trigger");
                return Ok(Triggered::Suppressed);
            }
            *status = GenerationStatus::Pending;
        }

        let pending = PendingGuard { feedback: self };
        self.reset();
        self.start();

        let outcome = action().await;
        pending.settle(if outcome.is_ok() {
            GenerationStatus::Succeeded
        } else {
            GenerationStatus::Failed
        });
        outcome.map(Triggered::Completed)
    }

    fn set_status(&self, status: GenerationStatus) {
        *self.status.lock().expect("feedback status lock poisoned") = status;
    }
}

impl Drop for GenerationFeedback {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for GenerationFeedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationFeedback")
            .field("label", &self.label)
            .field("status", &self.status())
            .field("hint", &self.current_hint())
            .finish()
    }
}

/// Returns the controller to `Idle` if a pending run is dropped before it
/// settles, so a cancelled caller never wedges the action.
struct PendingGuard<'a> {
    feedback: &'a GenerationFeedback,
}

impl PendingGuard<'_> {
    fn settle(self, status: GenerationStatus) {
        self.feedback.stop();
        self.feedback.set_status(status);
        std::mem::forget(self);
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.feedback.stop();
        self.feedback.set_status(GenerationStatus::Idle);
    }
}
