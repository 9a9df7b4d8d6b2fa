/**
* filename : main
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use anyhow::{anyhow, bail};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use combo_chase::config::Config;
use combo_chase::core::{ChaseParams, ChaseSupervisor, ComboBuilder, CostEstimate, MarketSnapshotAggregator, OrderRegistry, OrderSubmitter};
use combo_chase::gateway::{ChannelEventSink, EventDispatcher, Gateway, GatewaySession, PendingRequests, SimulatedGateway};
use combo_chase::models::combo::ComboSpecification;
use combo_chase::models::order::OrderType;
use combo_chase::models::ticket::OrderTicket;
use combo_chase::utils::logging;

struct CliArgs {
    config_path: String,
    assume_yes: bool,
    dry_run: bool,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = args
        .windows(2)
        .find(|pair| pair[0] == "--config")
        .map(|pair| pair[1].clone())
        .unwrap_or_else(|| "config".to_string());

    CliArgs {
        config_path,
        assume_yes: args.iter().any(|a| a == "--yes" || a == "-y"),
        dry_run: args.iter().any(|a| a == "--dry-run"),
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = parse_args();

    // 설정 로드
    let mut config = Config::load_from(&args.config_path)?;
    logging::init(&config.logging)?;
    log::info!("콤보 주문 추격기 시작 (v{})", combo_chase::VERSION);

    if args.dry_run {
        config.gateway.dry_run = true;
    }
    let ticket = config
        .ticket
        .clone()
        .ok_or_else(|| anyhow!("No order ticket configured; add a `ticket` section to {}", args.config_path))?;
    ticket.validate()?;

    if !config.gateway.dry_run {
        bail!("Only the simulated gateway is linked into this binary; run with --dry-run or DRY_RUN=1");
    }

    // 콜백 경로: 게이트웨이 -> 채널 -> 디스패처
    let registry = OrderRegistry::new();
    let pending = PendingRequests::new();
    let (sink, events) = ChannelEventSink::new();
    let dispatcher_token = CancellationToken::new();
    let dispatcher = EventDispatcher::new(registry.clone(), pending.clone()).spawn(events, dispatcher_token.clone());

    let simulated = SimulatedGateway::new(Arc::new(sink)).with_fill_level(ticket.final_price);
    let gateway: Arc<RwLock<dyn Gateway>> = Arc::new(RwLock::new(simulated));
    log::info!("모의 게이트웨이 초기화 완료");

    let session = Arc::new(GatewaySession::new(gateway.clone(), pending, &config.gateway));
    let first_order_id = session.connect(&config.gateway).await?;

    let legs = ticket.legs()?;
    let aggregator = MarketSnapshotAggregator::new(session.clone(), session.clone());
    let estimate = aggregator.estimate(&legs, |leg| leg.signed_quantity(1)).await;

    let mut spec = ComboBuilder::build(legs)?;
    if let Some(action) = ticket.action {
        spec = spec.with_action(action);
    }
    let chase = ticket.chase_params(&config.chase);
    print_preview(&spec, &estimate, &ticket, &chase);

    if !args.assume_yes && !confirm().await? {
        log::info!("주문 취소됨 (운영자 미확인)");
        stop_dispatcher(dispatcher_token, dispatcher).await;
        return Ok(());
    }

    let submitter = OrderSubmitter::new(gateway.clone(), session.clone(), registry.clone(), first_order_id);
    let limit_price = match ticket.order_type {
        OrderType::Limit => Some(ticket.initial_price),
        OrderType::Market => None,
    };
    let order_id = submitter.submit(&spec, ticket.order_type, limit_price).await?;

    if ticket.order_type == OrderType::Limit {
        let supervisor = ChaseSupervisor::new(gateway.clone(), registry.clone());
        supervisor.start(order_id, chase).await?;

        let shutdown = supervisor.shutdown_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("중단 신호 수신, 추격 중지");
                shutdown.cancel();
            }
        });

        let report = supervisor.join(order_id).await?;
        println!(
            "Order {}: {} after {} amendment(s); last price {}; average fill {}",
            report.order_id,
            report.outcome,
            report.amendments,
            report.last_price.map(|p| format!("{:.2}", p)).unwrap_or_else(|| "-".to_string()),
            report
                .average_fill_price
                .map(|p| format!("{:.4}", p))
                .unwrap_or_else(|| "-".to_string())
        );
    } else {
        println!("Market order {} submitted", order_id);
    }

    session.disconnect().await?;
    stop_dispatcher(dispatcher_token, dispatcher).await;
    log::info!("종료");
    Ok(())
}

async fn stop_dispatcher(token: CancellationToken, dispatcher: JoinHandle<()>) {
    if let Err(e) = EventDispatcher::stop(token, dispatcher).await {
        log::error!("이벤트 디스패처 비정상 종료: {}", e);
    }
}

fn print_preview(spec: &ComboSpecification, estimate: &CostEstimate, ticket: &OrderTicket, chase: &ChaseParams) {
    println!("{} {} x{} ({} leg(s))", spec.action(), spec.underlying(), spec.quantity(), spec.legs().len());
    println!("{}", estimate.summary());
    match ticket.order_type {
        OrderType::Limit => println!(
            "Limit {:.2} -> {:.2}, step {}, every {:?}{}",
            ticket.initial_price,
            chase.final_price,
            chase.step,
            chase.interval,
            if chase.stop_on_converge { ", stop at target" } else { "" }
        ),
        OrderType::Market => println!("Market order, no price chase"),
    }
}

async fn confirm() -> Result<bool, anyhow::Error> {
    print!("Submit this order? [y/N] ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
