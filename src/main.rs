use anyhow::Result;
use clap::Parser;
use notify_change_window::{create_event_source, create_window_query, Config, Relay};
use std::path::Path;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "notify-change-window")]
#[command(about = "Отслеживание смены активного окна и его заголовка")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "ncw.toml")]
    config: String,

    /// Режим сухого запуска (эмуляция событий окон)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает конфигурацию)
    #[arg(long)]
    log_level: Option<String>,

    /// Выход, если событий нет столько секунд (0 - ждать бесконечно)
    #[arg(long)]
    idle_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(idle_timeout) = args.idle_timeout {
        config.watch.idle_timeout_secs = idle_timeout;
    }
    config.validate()?;

    // Инициализация системы логирования
    init_tracing(&config.logging.level, &config.logging.format)?;

    info!("Запуск notify-change-window v{}", env!("CARGO_PKG_VERSION"));
    if Path::new(&args.config).exists() {
        info!("Конфигурация загружена из: {}", args.config);
    } else {
        info!("Файл {} не найден, используются значения по умолчанию", args.config);
    }

    if args.dry_run {
        warn!("Режим сухого запуска - события окон эмулируются");
    }

    let relay = Relay::new(
        create_event_source(args.dry_run)?,
        create_window_query(args.dry_run),
        config.relay_config()?,
    );

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(config.relay.output_capacity);
    let subscription = relay.subscribe(cancel.clone(), tx)?;

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
            Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
        }
        ctrl_c_cancel.cancel();
    });

    let idle_timeout = match config.watch.idle_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = recv_with_timeout(&mut rx, idle_timeout) => next,
        };

        match next {
            Ok(Some(notification)) => info!("windMsg: {}", notification),
            Ok(None) => {
                warn!("Канал уведомлений закрыт");
                break;
            }
            Err(_) => {
                info!("Нет событий окон {} с, выход", config.watch.idle_timeout_secs);
                break;
            }
        }
    }

    info!("Завершение работы...");
    cancel.cancel();

    // Ожидаем снятия hook (с таймаутом)
    let shutdown_timeout = Duration::from_secs(5);
    match timeout(shutdown_timeout, subscription.closed()).await {
        Ok(Ok(())) => info!("Подписка завершена корректно"),
        Ok(Err(e)) => warn!("Подписка завершилась с ошибкой: {}", e),
        Err(_) => warn!("Таймаут при завершении подписки"),
    }

    info!("notify-change-window завершил работу");
    Ok(())
}

async fn recv_with_timeout<T>(
    rx: &mut mpsc::Receiver<T>,
    idle_timeout: Option<Duration>,
) -> std::result::Result<Option<T>, tokio::time::error::Elapsed> {
    match idle_timeout {
        Some(limit) => timeout(limit, rx.recv()).await,
        None => Ok(rx.recv().await),
    }
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
