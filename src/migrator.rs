use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_store_balances_table::Migration),
            Box::new(m20240601_000002_create_platform_wallets_table::Migration),
            Box::new(m20240601_000003_create_products_table::Migration),
            Box::new(m20240601_000004_create_orders_tables::Migration),
            Box::new(m20240601_000005_create_payment_transactions_table::Migration),
            Box::new(m20240601_000006_create_payout_requests_table::Migration),
            Box::new(m20240601_000007_create_ledger_entries_table::Migration),
            Box::new(m20240601_000008_create_cart_sessions_table::Migration),
            Box::new(m20240601_000009_create_audit_log_tables::Migration),
            Box::new(m20240601_000010_create_outbox_tasks_table::Migration),
        ]
    }
}

mod m20240601_000001_create_store_balances_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_store_balances_table"
        }
    }

    #[derive(DeriveIden)]
    enum StoreBalances {
        Table,
        StoreId,
        Available,
        Reserved,
        LifetimeEarnings,
        Currency,
        MinimumPayoutAmount,
        CreatedAt,
        UpdatedAt,
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StoreBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StoreBalances::StoreId)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StoreBalances::Available)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreBalances::Reserved)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreBalances::LifetimeEarnings)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StoreBalances::Currency).string().not_null())
                        .col(
                            ColumnDef::new(StoreBalances::MinimumPayoutAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreBalances::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StoreBalances::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StoreBalances::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000002_create_platform_wallets_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_platform_wallets_table"
        }
    }

    #[derive(DeriveIden)]
    enum PlatformWallets {
        Table,
        Id,
        Address,
        Network,
        Currency,
        DailyTxCount,
        DailyVolume,
        DailyTxLimit,
        DailyVolumeLimit,
        IsActive,
        InMaintenance,
        LastUsedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PlatformWallets::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PlatformWallets::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PlatformWallets::Address)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PlatformWallets::Network).string().not_null())
                        .col(ColumnDef::new(PlatformWallets::Currency).string().not_null())
                        .col(
                            ColumnDef::new(PlatformWallets::DailyTxCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PlatformWallets::DailyVolume)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PlatformWallets::DailyTxLimit)
                                .integer()
                                .not_null()
                                .default(1000),
                        )
                        .col(
                            ColumnDef::new(PlatformWallets::DailyVolumeLimit)
                                .decimal()
                                .not_null()
                                .default(1_000_000),
                        )
                        .col(
                            ColumnDef::new(PlatformWallets::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PlatformWallets::InMaintenance)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(PlatformWallets::LastUsedAt).timestamp().null())
                        .col(
                            ColumnDef::new(PlatformWallets::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PlatformWallets::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_platform_wallets_network_currency")
                        .table(PlatformWallets::Table)
                        .col(PlatformWallets::Network)
                        .col(PlatformWallets::Currency)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PlatformWallets::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000003_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_products_table"
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        StoreId,
        Name,
        Price,
        Currency,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Price).decimal().not_null())
                        .col(ColumnDef::new(Products::Currency).string().not_null())
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_store_id")
                        .table(Products::Table)
                        .col(Products::StoreId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000004_create_orders_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_orders_tables"
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        StoreId,
        OrderNumber,
        CustomerPhone,
        Total,
        Currency,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        Name,
        Price,
        Quantity,
        CreatedAt,
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string().not_null())
                        .col(ColumnDef::new(Orders::Total).decimal().not_null())
                        .col(ColumnDef::new(Orders::Currency).string().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Name).string().not_null())
                        .col(ColumnDef::new(OrderItems::Price).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderItems::CreatedAt).timestamp().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_store_id")
                        .table(Orders::Table)
                        .col(Orders::StoreId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000005_create_payment_transactions_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_payment_transactions_table"
        }
    }

    #[derive(DeriveIden)]
    enum PaymentTransactions {
        Table,
        Id,
        StoreId,
        OrderId,
        CustomerPhone,
        CustomerEmail,
        AmountFiat,
        FiatCurrency,
        AmountCrypto,
        CryptoCurrency,
        ExchangeRate,
        PlatformWalletId,
        ExternalQuoteId,
        ExternalOnrampOrderId,
        ExternalDepositOrderId,
        BlockchainHash,
        Status,
        InitiatedAt,
        CompletedAt,
        FailedAt,
        ErrorMessage,
        RetryCount,
        MaxRetries,
        Metadata,
        CreatedAt,
        UpdatedAt,
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PaymentTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentTransactions::StoreId).uuid().not_null())
                        .col(ColumnDef::new(PaymentTransactions::OrderId).uuid().null())
                        .col(
                            ColumnDef::new(PaymentTransactions::CustomerPhone)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::CustomerEmail)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::AmountFiat)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::FiatCurrency)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::AmountCrypto)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::CryptoCurrency)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::ExchangeRate)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::PlatformWalletId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::ExternalQuoteId)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::ExternalOnrampOrderId)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::ExternalDepositOrderId)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::BlockchainHash)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::InitiatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::CompletedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::FailedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::ErrorMessage)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::RetryCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::MaxRetries)
                                .integer()
                                .not_null()
                                .default(60),
                        )
                        .col(ColumnDef::new(PaymentTransactions::Metadata).json().null())
                        .col(
                            ColumnDef::new(PaymentTransactions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::UpdatedAt)
                                .timestamp()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_transactions_store_id")
                        .table(PaymentTransactions::Table)
                        .col(PaymentTransactions::StoreId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_transactions_status")
                        .table(PaymentTransactions::Table)
                        .col(PaymentTransactions::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentTransactions::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000006_create_payout_requests_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000006_create_payout_requests_table"
        }
    }

    #[derive(DeriveIden)]
    enum PayoutRequests {
        Table,
        Id,
        StoreId,
        AmountRequested,
        AmountApproved,
        Currency,
        PayoutMethod,
        Destination,
        DestinationDetails,
        CryptoAmount,
        CryptoCurrency,
        ExchangeRate,
        PlatformWalletId,
        ExternalQuoteId,
        ExternalOfframpOrderId,
        BlockchainHash,
        Status,
        ErrorMessage,
        RequestedAt,
        ApprovedAt,
        CompletedAt,
        FailedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PayoutRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PayoutRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PayoutRequests::StoreId).uuid().not_null())
                        .col(
                            ColumnDef::new(PayoutRequests::AmountRequested)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PayoutRequests::AmountApproved)
                                .decimal()
                                .null(),
                        )
                        .col(ColumnDef::new(PayoutRequests::Currency).string().not_null())
                        .col(
                            ColumnDef::new(PayoutRequests::PayoutMethod)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PayoutRequests::Destination)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PayoutRequests::DestinationDetails)
                                .json()
                                .null(),
                        )
                        .col(ColumnDef::new(PayoutRequests::CryptoAmount).decimal().null())
                        .col(
                            ColumnDef::new(PayoutRequests::CryptoCurrency)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(PayoutRequests::ExchangeRate).decimal().null())
                        .col(
                            ColumnDef::new(PayoutRequests::PlatformWalletId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PayoutRequests::ExternalQuoteId)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PayoutRequests::ExternalOfframpOrderId)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PayoutRequests::BlockchainHash)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(PayoutRequests::Status).string().not_null())
                        .col(ColumnDef::new(PayoutRequests::ErrorMessage).string().null())
                        .col(
                            ColumnDef::new(PayoutRequests::RequestedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PayoutRequests::ApprovedAt).timestamp().null())
                        .col(
                            ColumnDef::new(PayoutRequests::CompletedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(ColumnDef::new(PayoutRequests::FailedAt).timestamp().null())
                        .col(
                            ColumnDef::new(PayoutRequests::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PayoutRequests::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payout_requests_store_id")
                        .table(PayoutRequests::Table)
                        .col(PayoutRequests::StoreId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payout_requests_status")
                        .table(PayoutRequests::Table)
                        .col(PayoutRequests::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PayoutRequests::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000007_create_ledger_entries_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000007_create_ledger_entries_table"
        }
    }

    #[derive(DeriveIden)]
    enum LedgerEntries {
        Table,
        Id,
        StoreId,
        TransactionType,
        TransactionReference,
        Amount,
        Currency,
        BalanceBefore,
        BalanceAfter,
        Description,
        PaymentId,
        PayoutId,
        CreatedAt,
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LedgerEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LedgerEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::StoreId).uuid().not_null())
                        .col(
                            ColumnDef::new(LedgerEntries::TransactionType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LedgerEntries::TransactionReference)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::Amount).decimal().not_null())
                        .col(ColumnDef::new(LedgerEntries::Currency).string().not_null())
                        .col(
                            ColumnDef::new(LedgerEntries::BalanceBefore)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LedgerEntries::BalanceAfter)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LedgerEntries::Description)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::PaymentId).uuid().null())
                        .col(ColumnDef::new(LedgerEntries::PayoutId).uuid().null())
                        .col(
                            ColumnDef::new(LedgerEntries::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ledger_entries_store_id_created_at")
                        .table(LedgerEntries::Table)
                        .col(LedgerEntries::StoreId)
                        .col(LedgerEntries::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000008_create_cart_sessions_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000008_create_cart_sessions_table"
        }
    }

    #[derive(DeriveIden)]
    enum CartSessions {
        Table,
        Id,
        StoreId,
        CustomerPhone,
        Items,
        Total,
        Currency,
        Status,
        LastActivityAt,
        ReminderSentAt,
        CreatedAt,
        UpdatedAt,
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CartSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CartSessions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartSessions::StoreId).uuid().not_null())
                        .col(
                            ColumnDef::new(CartSessions::CustomerPhone)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartSessions::Items).json().not_null())
                        .col(
                            ColumnDef::new(CartSessions::Total)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(CartSessions::Currency).string().not_null())
                        .col(ColumnDef::new(CartSessions::Status).string().not_null())
                        .col(
                            ColumnDef::new(CartSessions::LastActivityAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartSessions::ReminderSentAt)
                                .timestamp()
                                .null(),
                        )
                        .col(ColumnDef::new(CartSessions::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(CartSessions::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_sessions_store_phone")
                        .table(CartSessions::Table)
                        .col(CartSessions::StoreId)
                        .col(CartSessions::CustomerPhone)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartSessions::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000009_create_audit_log_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000009_create_audit_log_tables"
        }
    }

    #[derive(DeriveIden)]
    enum GatewayRequestLogs {
        Table,
        Id,
        Operation,
        CorrelationId,
        Request,
        Response,
        HttpStatus,
        Success,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum MessageLogs {
        Table,
        Id,
        StoreId,
        ProviderMessageId,
        Direction,
        CustomerPhone,
        Payload,
        DeliveryStatus,
        CreatedAt,
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(GatewayRequestLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(GatewayRequestLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GatewayRequestLogs::Operation)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GatewayRequestLogs::CorrelationId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GatewayRequestLogs::Request).json().not_null())
                        .col(
                            ColumnDef::new(GatewayRequestLogs::Response)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GatewayRequestLogs::HttpStatus)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GatewayRequestLogs::Success)
                                .boolean()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GatewayRequestLogs::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MessageLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MessageLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MessageLogs::StoreId).uuid().not_null())
                        .col(
                            ColumnDef::new(MessageLogs::ProviderMessageId)
                                .string()
                                .null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(MessageLogs::Direction).string().not_null())
                        .col(
                            ColumnDef::new(MessageLogs::CustomerPhone)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MessageLogs::Payload).json().not_null())
                        .col(
                            ColumnDef::new(MessageLogs::DeliveryStatus)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MessageLogs::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MessageLogs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(GatewayRequestLogs::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000010_create_outbox_tasks_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000010_create_outbox_tasks_table"
        }
    }

    #[derive(DeriveIden)]
    enum OutboxTasks {
        Table,
        Id,
        TaskType,
        Payload,
        Status,
        Attempts,
        MaxAttempts,
        LastError,
        AvailableAt,
        CreatedAt,
        UpdatedAt,
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OutboxTasks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OutboxTasks::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OutboxTasks::TaskType).string().not_null())
                        .col(ColumnDef::new(OutboxTasks::Payload).json().not_null())
                        .col(ColumnDef::new(OutboxTasks::Status).string().not_null())
                        .col(
                            ColumnDef::new(OutboxTasks::Attempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OutboxTasks::MaxAttempts)
                                .integer()
                                .not_null()
                                .default(8),
                        )
                        .col(ColumnDef::new(OutboxTasks::LastError).string().null())
                        .col(
                            ColumnDef::new(OutboxTasks::AvailableAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OutboxTasks::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(OutboxTasks::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_outbox_tasks_status_available_at")
                        .table(OutboxTasks::Table)
                        .col(OutboxTasks::Status)
                        .col(OutboxTasks::AvailableAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OutboxTasks::Table).to_owned())
                .await
        }
    }
}
