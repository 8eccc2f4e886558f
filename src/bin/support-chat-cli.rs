//! 客服聊天 CLI 客户端（测试版）
//!
//! 非交互式 CLI，用于测试和展示聊天功能
//! 启动时通过命令行参数指定账号，自动登录连接，展示接收到的事件

use anyhow::Result;
use clap::Parser;
use support_chat_sdk_rust::chat::client::{ChatClient, ChatSurface, ClientConfig};
use support_chat_sdk_rust::chat::conversation::ConversationListener;
use support_chat_sdk_rust::chat::listener::ChatEventListener;
use support_chat_sdk_rust::chat::login_async;
use support_chat_sdk_rust::chat::render::preview_label;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// 客服聊天 CLI 客户端
#[derive(Parser, Debug)]
#[command(name = "support-chat-cli")]
#[command(about = "客服聊天 CLI 客户端 - 用于测试和展示聊天功能", long_about = None)]
struct Args {
    /// 登录邮箱
    #[arg(short, long, default_value = "admin@example.com")]
    email: String,

    /// 登录密码
    #[arg(short, long, default_value = "admin123")]
    password: String,

    /// 界面类型：admin 或 customer
    #[arg(short, long, default_value = "admin")]
    surface: String,

    /// HTTP API 基础地址
    #[arg(long, default_value = "http://localhost:8080/api/v1")]
    api_base_url: String,

    /// WebSocket 服务器地址
    #[arg(long, default_value = "ws://localhost:8080")]
    ws_url: String,

    /// 运行时长（秒），0 表示持续运行
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// 日志级别（默认: info,support_chat_sdk_rust=debug）
    #[arg(long, default_value = "info,support_chat_sdk_rust=debug")]
    log_level: String,
}

/// 初始化日志（同时输出到 stdout 和文件）
fn init_logger(log_level: &str) {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG（如果设置了），否则使用命令行参数
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // 创建日志文件（追加模式）
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("无法创建日志文件 debug.log");

    // 输出到 stdout（控制台），保留 ANSI 颜色代码用于终端显示
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(true);

    // 输出到文件，禁用 ANSI 颜色代码（文件不需要颜色）
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("[CLI] 📝 日志已同时输出到控制台和文件: debug.log");
}

/// 设置监听器（输出所有接收到的事件）
fn setup_listeners(client: &mut ChatClient) {
    // 聊天事件监听器
    struct CliChatListener;
    #[async_trait::async_trait]
    impl ChatEventListener for CliChatListener {
        async fn on_connection_status_changed(&self, connected: bool, message: String) {
            if connected {
                info!("[CLI/Chat] 🔗 已连接: {}", message);
            } else {
                warn!("[CLI/Chat] 🔗 断开连接: {}", message);
            }
        }

        async fn on_new_message(&self, message: String) {
            info!("[CLI/Chat] 📨 收到新消息: {}", message);
        }

        async fn on_message_read(&self, receipt: String) {
            info!("[CLI/Chat] 📖 已读回执: {}", receipt);
        }

        async fn on_conversation_read(&self, receipt: String) {
            info!("[CLI/Chat] 📖 会话已读: {}", receipt);
        }

        async fn on_unread_count_changed(&self, unread_count: u32) {
            info!("[CLI/Chat] 📬 未读计数: {}", unread_count);
        }

        async fn on_send_failed(&self, client_temp_id: String, reason: String) {
            error!(
                "[CLI/Chat] ❌ 消息发送失败: clientTempId={}, 原因: {}",
                client_temp_id, reason
            );
        }

        async fn on_upload_failed(&self, reason: String) {
            error!("[CLI/Chat] ❌ 图片上传失败: {}", reason);
        }
    }
    client.set_listener(Arc::new(CliChatListener));

    // 会话列表监听器
    struct CliConversationListener;
    #[async_trait::async_trait]
    impl ConversationListener for CliConversationListener {
        async fn on_conversation_list_refreshed(&self, conversation_list: String) {
            info!("[CLI/Conversation] 🔄 列表刷新: {}", conversation_list);
        }

        async fn on_conversation_changed(&self, conversation: String) {
            info!("[CLI/Conversation] 🔄 会话变更: {}", conversation);
        }

        async fn on_new_conversation_detected(&self, sender_id: String) {
            info!("[CLI/Conversation] 🆕 新会话: senderId={}", sender_id);
        }

        async fn on_total_unread_message_count_changed(&self, total_unread_count: i32) {
            info!("[CLI/Conversation] 📬 总未读数: {}", total_unread_count);
        }
    }
    client.set_conversation_listener(Arc::new(CliConversationListener));
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    init_logger(&args.log_level);

    info!("[CLI] 🚀 客服聊天 CLI 客户端（测试模式）");
    info!("[CLI] 📧 邮箱: {}", args.email);
    info!("[CLI] 🖥️  界面: {}", args.surface);
    info!("[CLI] ⏱️  运行时长: {} 秒（0=持续运行）", args.duration);

    // 登录
    info!("[CLI] 🔐 正在登录...");
    let login = login_async(&args.api_base_url, args.email.clone(), args.password.clone())
        .await
        .map_err(|e| anyhow::anyhow!("登录失败: {}", e))?;
    info!("[CLI] ✅ 登录成功！用户ID: {}", login.user.id);

    let surface = match args.surface.as_str() {
        "customer" => ChatSurface::Customer,
        "admin" => ChatSurface::Admin,
        other => {
            return Err(anyhow::anyhow!("未知界面类型: {}（支持 admin/customer）", other));
        }
    };

    // 创建客户端
    let mut config = ClientConfig::new(login.user.id.clone(), login.access_token, surface);
    config.api_base_url = args.api_base_url.clone();
    config.ws_url = args.ws_url.clone();
    let mut client = ChatClient::new(config)?;

    // 设置监听器
    setup_listeners(&mut client);

    // 连接
    info!("[CLI] 🔗 正在连接服务器...");
    client
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("连接失败: {}", e))?;
    info!("[CLI] ✅ 连接成功！");

    // 显示初始信息（给后台任务一点时间完成初始拉取）
    sleep(Duration::from_secs(2)).await;
    if surface == ChatSurface::Admin {
        let conversations = client.conversations();
        info!("[CLI] 📋 会话列表（共 {} 个）:", conversations.len());
        for conv in conversations.iter().take(5) {
            let preview = conv
                .preview()
                .map(preview_label)
                .unwrap_or_else(|| "No messages yet".to_string());
            info!(
                "[CLI]   - {} | 未读: {} | 最新: {}",
                conv.user.display_name(),
                conv.unread_count(),
                preview
            );
        }
        info!("[CLI] 📬 总未读数: {}", client.total_unread_count());
    } else {
        client.set_surface_open(true).await;
        info!("[CLI] 📬 未读计数: {}", client.unread_count());
    }

    info!("[CLI] 📥 开始监听事件...");
    info!("[CLI] 💡 提示：程序将持续运行并显示接收到的所有消息和事件");
    if args.duration > 0 {
        info!("[CLI] ⏰ {} 秒后自动退出", args.duration);
        sleep(Duration::from_secs(args.duration)).await;
        client.disconnect().await;
        info!("[CLI] 👋 程序退出");
    } else {
        info!("[CLI] ⏰ 持续运行中，按 Ctrl+C 退出");
        // 持续运行直到被中断
        loop {
            sleep(Duration::from_secs(3600)).await;
        }
    }

    Ok(())
}
