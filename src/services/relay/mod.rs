//! Relay: bridges the OS WinEvent callback thread to a consumer channel.
//!
//! The callback pushes each notification onto a small bounded relay channel
//! and blocks until the forwarding task has handed it to the consumer, so
//! notifications arrive in the order the OS raised them and none are dropped.
//! Both the hand-off and the acknowledgment wait race against cancellation,
//! which keeps shutdown from deadlocking on a blocked callback.

mod producer;

use crate::error::Result;
use crate::events::WindowChangeNotification;
use crate::ncw_error;
use crate::services::event_source::{EventSource, HookId, HookOptions};
use crate::services::window_query::WindowQuery;
use producer::{RelayProducer, Relayed};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Какие смены заголовка пересылать
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TitlePolicy {
    /// Только для окна, которое последним стало активным
    #[default]
    ForegroundOnly,
    /// Для любого окна верхнего уровня
    AllWindows,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Ёмкость внутреннего канала между callback и пересылающей задачей
    pub capacity: usize,
    pub hook: HookOptions,
    pub title_policy: TitlePolicy,
    /// Запрашивать заголовок и прямоугольник прямо в callback
    pub prefetch: bool,
    pub resolve_process_name: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            hook: HookOptions::default(),
            title_policy: TitlePolicy::default(),
            prefetch: true,
            resolve_process_name: false,
        }
    }
}

pub struct Relay {
    source: Arc<dyn EventSource>,
    query: Arc<dyn WindowQuery>,
    config: RelayConfig,
}

impl Relay {
    pub fn new(source: Arc<dyn EventSource>, query: Arc<dyn WindowQuery>, config: RelayConfig) -> Self {
        Self {
            source,
            query,
            config,
        }
    }

    /// Установить hook и запустить пересылку в `output`.
    ///
    /// Возвращается сразу. Должна вызываться внутри tokio runtime. Ошибка
    /// установки hook возвращается синхронно, повторных попыток нет.
    pub fn subscribe(
        &self,
        cancel: CancellationToken,
        output: mpsc::Sender<WindowChangeNotification>,
    ) -> Result<Subscription> {
        let runtime = Handle::try_current()
            .map_err(|e| ncw_error!(internal, "subscribe вызван вне tokio runtime: {}", e))?;

        if self.config.capacity == 0 {
            return Err(ncw_error!(internal, "Ёмкость relay должна быть больше 0"));
        }

        let cancel = cancel.child_token();
        let (relay_tx, relay_rx) = mpsc::channel(self.config.capacity);
        let producer = Arc::new(RelayProducer::new(
            relay_tx,
            cancel.clone(),
            runtime.clone(),
            Arc::clone(&self.query),
            &self.config,
        ));

        let hook = self.source.register(&self.config.hook, producer)?;
        info!("Windows Event Hook: {} ({:?})", hook, self.config.title_policy);

        let forward = runtime.spawn(forward_loop(
            relay_rx,
            output,
            cancel.clone(),
            Arc::clone(&self.source),
            hook,
        ));

        Ok(Subscription {
            cancel,
            hook,
            forward,
        })
    }
}

/// Активная подписка. Живёт до отмены внешнего токена или [`Subscription::cancel`].
pub struct Subscription {
    cancel: CancellationToken,
    hook: HookId,
    forward: JoinHandle<()>,
}

impl Subscription {
    pub fn hook(&self) -> HookId {
        self.hook
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Дождаться завершения пересылающей задачи (hook к этому моменту снят)
    pub async fn closed(self) -> Result<()> {
        self.forward
            .await
            .map_err(|e| ncw_error!(internal, "Пересылающая задача завершилась аварийно: {}", e))
    }
}

async fn forward_loop(
    mut relay_rx: mpsc::Receiver<Relayed>,
    output: mpsc::Sender<WindowChangeNotification>,
    cancel: CancellationToken,
    source: Arc<dyn EventSource>,
    hook: HookId,
) {
    let mut forwarded: u64 = 0;

    loop {
        let Relayed { notification, ack } = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            relayed = relay_rx.recv() => match relayed {
                Some(relayed) => relayed,
                None => break,
            },
        };

        // Отправка может ждать медленного потребителя: это и есть backpressure.
        // При отмене ack сбрасывается, и заблокированный callback освобождается.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = output.send(notification) => {
                if sent.is_err() {
                    warn!("Потребитель закрыл канал уведомлений, подписка {} отменяется", hook);
                    cancel.cancel();
                    break;
                }
            }
        }

        forwarded += 1;
        let _ = ack.send(());
    }

    if source.unregister(hook) {
        info!("Event Hook {} снят", hook);
    } else {
        warn!("Не удалось снять Event Hook {}", hook);
    }
    relay_rx.close();

    info!("Event Hook Active Window Exit: переслано {} уведомлений", forwarded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NcwError;
    use crate::events::{
        BoundingRect, RawWinEvent, WindowEventKind, WindowHandle, EVENT_OBJECT_NAMECHANGE,
    };
    use crate::services::event_source::WinEventSink;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;
    use tokio::time::timeout;

    const CLOSED: isize = 0xDEAD;
    const WAIT: Duration = Duration::from_secs(2);

    /// Источник событий для тестов: запоминает регистрации и отдаёт sink наружу
    #[derive(Default)]
    struct FakeEventSource {
        fail: bool,
        sink: Mutex<Option<Arc<dyn WinEventSink>>>,
        registered: Mutex<Vec<HookOptions>>,
        unregistered: Mutex<Vec<HookId>>,
    }

    impl FakeEventSource {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sink(&self) -> Arc<dyn WinEventSink> {
            self.sink.lock().clone().expect("hook не установлен")
        }
    }

    impl EventSource for FakeEventSource {
        fn register(&self, options: &HookOptions, sink: Arc<dyn WinEventSink>) -> Result<HookId> {
            if self.fail {
                return Err(NcwError::HookRegistration("invalid hook".to_string()));
            }
            self.registered.lock().push(options.clone());
            *self.sink.lock() = Some(sink);
            Ok(HookId(7))
        }

        fn unregister(&self, hook: HookId) -> bool {
            self.unregistered.lock().push(hook);
            true
        }
    }

    /// Заголовок и прямоугольник выводятся из handle; CLOSED ведёт себя как закрытое окно
    struct FakeQuery;

    impl WindowQuery for FakeQuery {
        fn title(&self, handle: WindowHandle) -> String {
            if handle.as_raw() == CLOSED {
                String::new()
            } else {
                format!("window {}", handle.as_raw())
            }
        }

        fn bounding_rect(&self, handle: WindowHandle) -> BoundingRect {
            if handle.as_raw() == CLOSED {
                BoundingRect::default()
            } else {
                let raw = handle.as_raw() as i32;
                BoundingRect::new(raw, raw, raw + 100, raw + 50)
            }
        }

        fn process_name(&self, handle: WindowHandle) -> Result<String> {
            if handle.as_raw() == CLOSED {
                NcwError::process_resolution(handle, "process exited")
            } else {
                Ok("app.exe".to_string())
            }
        }
    }

    struct Harness {
        source: Arc<FakeEventSource>,
        subscription: Subscription,
        rx: mpsc::Receiver<WindowChangeNotification>,
        cancel: CancellationToken,
    }

    fn start(config: RelayConfig, output_capacity: usize) -> Harness {
        let source = Arc::new(FakeEventSource::default());
        let relay = Relay::new(source.clone(), Arc::new(FakeQuery), config);
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(output_capacity);
        let subscription = relay.subscribe(cancel.clone(), tx).unwrap();
        Harness {
            source,
            subscription,
            rx,
            cancel,
        }
    }

    /// Эмуляция потока ОС: события по одному, каждое блокирует до подтверждения
    fn emit(source: &Arc<FakeEventSource>, events: Vec<RawWinEvent>) -> (thread::JoinHandle<()>, Arc<AtomicBool>) {
        let sink = source.sink();
        let done = Arc::new(AtomicBool::new(false));
        let done_flag = done.clone();
        let join = thread::spawn(move || {
            for event in events {
                sink.on_event(event);
            }
            done_flag.store(true, Ordering::SeqCst);
        });
        (join, done)
    }

    async fn next(rx: &mut mpsc::Receiver<WindowChangeNotification>) -> WindowChangeNotification {
        timeout(WAIT, rx.recv())
            .await
            .expect("уведомление не пришло вовремя")
            .expect("канал закрыт")
    }

    fn handle(raw: isize) -> WindowHandle {
        WindowHandle::from_raw(raw)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn n_foreground_events_arrive_in_order() {
        let mut h = start(RelayConfig::default(), 4);
        let events = (1..=25).map(|raw| RawWinEvent::foreground(handle(raw))).collect();
        let (join, _) = emit(&h.source, events);

        for raw in 1..=25 {
            let notification = next(&mut h.rx).await;
            assert_eq!(notification.handle, handle(raw));
            assert_eq!(notification.kind, WindowEventKind::ForegroundChanged);
            assert_eq!(notification.title, format!("window {}", raw));
            assert_eq!(notification.rect.width(), 100);
            assert_eq!(notification.process_name, None);
        }

        join.join().unwrap();
        assert!(h.rx.try_recv().is_err());
        h.cancel.cancel();
        h.subscription.closed().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_before_events_unregisters_hook() {
        let mut h = start(RelayConfig::default(), 4);
        assert_eq!(h.subscription.hook(), HookId(7));
        assert_eq!(h.source.registered.lock().len(), 1);

        h.cancel.cancel();
        assert!(h.subscription.is_cancelled());
        h.subscription.closed().await.unwrap();

        assert_eq!(*h.source.unregistered.lock(), vec![HookId(7)]);
        assert!(timeout(WAIT, h.rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn foreground_then_title_on_same_window() {
        let mut h = start(RelayConfig::default(), 4);
        let (join, _) = emit(
            &h.source,
            vec![RawWinEvent::foreground(handle(5)), RawWinEvent::name_change(handle(5))],
        );

        let first = next(&mut h.rx).await;
        let second = next(&mut h.rx).await;
        assert_eq!((first.handle, first.kind), (handle(5), WindowEventKind::ForegroundChanged));
        assert_eq!((second.handle, second.kind), (handle(5), WindowEventKind::TitleChanged));

        join.join().unwrap();
        assert!(h.rx.try_recv().is_err());
        h.subscription.cancel();
        h.subscription.closed().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn foreground_only_policy_filters_title_changes() {
        let mut h = start(RelayConfig::default(), 8);
        let (join, _) = emit(
            &h.source,
            vec![
                RawWinEvent::foreground(handle(1)),
                RawWinEvent::name_change(handle(2)),
                // имя дочернего объекта, а не окна
                RawWinEvent::new(EVENT_OBJECT_NAMECHANGE, handle(1), -4),
                // EVENT_OBJECT_LOCATIONCHANGE
                RawWinEvent::new(0x800B, handle(1), 0),
                RawWinEvent::name_change(handle(1)),
            ],
        );
        join.join().unwrap();

        let first = next(&mut h.rx).await;
        let second = next(&mut h.rx).await;
        assert_eq!(first.kind, WindowEventKind::ForegroundChanged);
        assert_eq!((second.handle, second.kind), (handle(1), WindowEventKind::TitleChanged));
        assert!(h.rx.try_recv().is_err());

        h.cancel.cancel();
        h.subscription.closed().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn all_windows_policy_relays_any_title_change() {
        let config = RelayConfig {
            title_policy: TitlePolicy::AllWindows,
            ..RelayConfig::default()
        };
        let mut h = start(config, 4);
        let (join, _) = emit(&h.source, vec![RawWinEvent::name_change(handle(9))]);
        join.join().unwrap();

        let notification = next(&mut h.rx).await;
        assert_eq!((notification.handle, notification.kind), (handle(9), WindowEventKind::TitleChanged));

        h.cancel.cancel();
        h.subscription.closed().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_queries_degrade_without_breaking_relay() {
        let config = RelayConfig {
            resolve_process_name: true,
            ..RelayConfig::default()
        };
        let mut h = start(config, 4);
        let (join, _) = emit(
            &h.source,
            vec![RawWinEvent::foreground(handle(CLOSED)), RawWinEvent::foreground(handle(3))],
        );
        join.join().unwrap();

        let closed = next(&mut h.rx).await;
        assert_eq!(closed.title, "");
        assert!(closed.rect.is_zero());
        assert_eq!(closed.process_name, None);

        let alive = next(&mut h.rx).await;
        assert_eq!(alive.process_name.as_deref(), Some("app.exe"));

        h.cancel.cancel();
        h.subscription.closed().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn without_prefetch_only_handle_is_sent() {
        let config = RelayConfig {
            prefetch: false,
            ..RelayConfig::default()
        };
        let mut h = start(config, 4);
        let (join, _) = emit(&h.source, vec![RawWinEvent::foreground(handle(4))]);
        join.join().unwrap();

        let notification = next(&mut h.rx).await;
        assert_eq!(notification.handle, handle(4));
        assert_eq!(notification.title, "");
        assert!(notification.rect.is_zero());

        h.cancel.cancel();
        h.subscription.closed().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn undrained_consumer_blocks_producer_until_cancel() {
        let h = start(RelayConfig::default(), 1);
        let (join, done) = emit(
            &h.source,
            vec![RawWinEvent::foreground(handle(1)), RawWinEvent::foreground(handle(2))],
        );

        // Первое уведомление легло в буфер потребителя, второе ждёт места
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!done.load(Ordering::SeqCst));
        assert!(!join.is_finished());

        h.cancel.cancel();
        let released = tokio::task::spawn_blocking(move || join.join());
        timeout(WAIT, released).await.unwrap().unwrap().unwrap();
        assert!(done.load(Ordering::SeqCst));

        h.subscription.closed().await.unwrap();
        assert_eq!(*h.source.unregistered.lock(), vec![HookId(7)]);

        let mut rx = h.rx;
        assert_eq!(rx.recv().await.map(|n| n.handle), Some(handle(1)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_consumer_cancels_subscription() {
        let h = start(RelayConfig::default(), 1);
        drop(h.rx);

        let (join, _) = emit(&h.source, vec![RawWinEvent::foreground(handle(1))]);
        let released = tokio::task::spawn_blocking(move || join.join());
        timeout(WAIT, released).await.unwrap().unwrap().unwrap();

        assert!(h.subscription.is_cancelled());
        assert!(!h.cancel.is_cancelled());
        h.subscription.closed().await.unwrap();
        assert_eq!(*h.source.unregistered.lock(), vec![HookId(7)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn events_after_cancel_are_not_relayed() {
        let mut h = start(RelayConfig::default(), 4);
        h.cancel.cancel();

        let (join, _) = emit(&h.source, vec![RawWinEvent::foreground(handle(1))]);
        let released = tokio::task::spawn_blocking(move || join.join());
        timeout(WAIT, released).await.unwrap().unwrap().unwrap();

        h.subscription.closed().await.unwrap();
        assert!(h.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn registration_failure_is_reported() {
        let source = Arc::new(FakeEventSource::failing());
        let relay = Relay::new(source.clone(), Arc::new(FakeQuery), RelayConfig::default());
        let (tx, _rx) = mpsc::channel(1);

        let result = relay.subscribe(CancellationToken::new(), tx);
        assert!(matches!(result, Err(NcwError::HookRegistration(_))));
        assert!(source.sink.lock().is_none());
        assert!(source.unregistered.lock().is_empty());
    }

    #[test]
    fn subscribe_outside_runtime_fails() {
        let relay = Relay::new(
            Arc::new(FakeEventSource::default()),
            Arc::new(FakeQuery),
            RelayConfig::default(),
        );
        let (tx, _rx) = mpsc::channel(1);

        let result = relay.subscribe(CancellationToken::new(), tx);
        assert!(matches!(result, Err(NcwError::Internal(_))));
    }
}
